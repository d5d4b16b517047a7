//! bcache_core: 并发安全的定长块缓存
//!
//! 位于块设备与上层使用者（例如文件系统）之间：
//! - 在内存中缓存最近使用的块，减少设备读
//! - 保证同一时刻只有一个使用者访问某个块的内存副本
//!
//! # 示例
//!
//! ```rust,ignore
//! use bcache_core::{BufferCache, CacheConfig, RamDisk, TickCounter, Result};
//!
//! fn main() -> Result<()> {
//!     let cache = BufferCache::new(CacheConfig::default(), RamDisk::new(1024, 1024), TickCounter::new())?;
//!
//!     let mut buf = cache.read(1, 0)?;
//!     buf.data_mut()[0] = 0x42;
//!     cache.write(&mut buf)?;
//!     cache.release(buf)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备驱动接口
//! - [`sync`] - 独占锁与滴答源
//! - [`cache`] - 块缓存
//! - [`consts`] - 默认配置常量

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 同步原语
pub mod sync;

/// 块缓存
pub mod cache;

/// 常量定义
pub mod consts;

// ===== 公共导出 =====

pub use error::{Error, ErrorKind, Result};

pub use block::{BlockDevice, RamDisk};

pub use sync::{SleepLock, TickCounter, TickSource};

pub use cache::{
    BlockKey, BufFlags, BufGuard, BufHandle, Buffer, BufferCache, BufferId, CacheConfig,
    CacheStats,
};
