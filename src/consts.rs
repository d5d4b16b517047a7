//! 块缓存常量定义

/// 默认缓冲区数量
pub const NBUF: usize = 30;

/// 默认哈希桶数量（取素数，使块号分布更均匀）
pub const NBUCKET: usize = 13;

/// 默认块大小（字节）
pub const BSIZE: usize = 1024;
