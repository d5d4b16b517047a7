//! 块缓存模块
//!
//! 缓存固定数量的块副本，减少设备读，并作为多个并发使用者访问同一块的同步点。
//!
//! # 主要组件
//!
//! - [`Buffer`] - 单个缓冲区：块数据、状态标志、独占锁
//! - `Bucket` - 哈希桶：按插入顺序保存缓冲区及其身份、引用计数、最近使用时间
//! - [`BufferCache`] - 缓存本体：查找/回收/窃取，以及 read/write/release/pin/unpin
//! - [`BufGuard`] - 已加锁的缓冲区
//! - [`CacheConfig`] / [`CacheStats`] - 配置与统计
//!
//! # 设计原理
//!
//! 1. **固定数组 + 下标**：缓冲区初始化后不再分配或释放，桶里只存下标，
//!    不需要侵入式链表
//! 2. **两级锁**：桶锁保护元数据，独占锁保护数据；桶锁从不跨越阻塞操作
//! 3. **按滴答值做 LRU**：释放时记录时间戳，不调整链表顺序
//! 4. **锁顺序**：同时持有两个桶锁时总是先锁下标小的桶
//! 5. **可恢复的错误**：缓存耗尽返回 `NoSpace`，而不是终止进程
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use bcache_core::{BufferCache, CacheConfig, RamDisk, TickCounter};
//!
//! let cache = BufferCache::new(CacheConfig::default(), RamDisk::new(1024, 4096), TickCounter::new())?;
//!
//! let mut buf = cache.read(1, 100)?;
//! buf.write_u32(0, 42)?;
//! cache.write(&mut buf)?;
//! cache.release(buf)?;
//!
//! let stats = cache.stats();
//! println!("hit rate: {:.2}", stats.hit_rate());
//! ```

mod block_cache;
mod bucket;
mod buffer;
mod config;
mod guard;

pub use block_cache::{BufferCache, CacheStats};
pub use buffer::{BlockKey, BufFlags, Buffer, BufferId};
pub use config::CacheConfig;
pub use guard::{BufGuard, BufHandle};
