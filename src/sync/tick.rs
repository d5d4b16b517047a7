//! 时钟滴答源
//!
//! 缓存只用滴答值比较缓冲区的新旧，不要求与墙上时间对应。

use core::sync::atomic::{AtomicU64, Ordering};

/// 单调不减的滴答计数器接口
///
/// 读取必须不阻塞：缓存会在持有桶锁时调用它。
///
/// # 示例
///
/// ```ignore
/// struct TimerTicks;
/// impl TickSource for TimerTicks {
///     fn ticks(&self) -> u64 {
///         timer::ticks()
///     }
/// }
/// ```
pub trait TickSource: Send + Sync {
    /// 当前滴答值
    fn ticks(&self) -> u64;
}

/// 由时钟中断推进的滴答计数器
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicU64,
}

impl TickCounter {
    /// 创建从 0 开始的计数器
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// 前进一个滴答，返回新值
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 前进 `n` 个滴答，返回新值
    pub fn advance(&self, n: u64) -> u64 {
        self.ticks.fetch_add(n, Ordering::Relaxed) + n
    }
}

impl TickSource for TickCounter {
    #[inline]
    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl<T: TickSource + ?Sized> TickSource for &T {
    #[inline]
    fn ticks(&self) -> u64 {
        (**self).ticks()
    }
}

impl<T: TickSource + ?Sized> TickSource for alloc::sync::Arc<T> {
    #[inline]
    fn ticks(&self) -> u64 {
        (**self).ticks()
    }
}
