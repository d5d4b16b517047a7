//! 同步原语
//!
//! - 桶锁直接使用 `spin::Mutex`：临界区很短，只保护链表与引用计数
//! - [`SleepLock`] - 缓冲区独占锁，允许持有期间阻塞
//! - [`TickSource`] - 最近使用时间戳来源

mod sleeplock;
mod tick;

pub use sleeplock::{SleepLock, SleepLockGuard};
pub use tick::{TickCounter, TickSource};
