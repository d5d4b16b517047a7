//! 缓冲区独占锁
//!
//! 对应缓冲区的长期锁：持有者可能在锁内进行阻塞的设备 I/O，
//! 等待者不应长时间占用 CPU。

use spin::mutex::{Mutex, MutexGuard};

#[cfg(any(test, feature = "std"))]
type Relax = spin::relax::Yield;

#[cfg(not(any(test, feature = "std")))]
type Relax = spin::relax::Spin;

/// 独占锁守卫，drop 时释放锁
pub type SleepLockGuard<'a, T> = MutexGuard<'a, T>;

/// 可阻塞的独占锁
///
/// 在 `std` 特性下，等待者每轮让出 CPU（`thread::yield_now`）；
/// 在 `no_std` 下退化为自旋等待，由宿主调度器负责抢占。
///
/// 与桶锁不同，此锁允许在持有期间执行耗时操作。
///
/// # 示例
///
/// ```rust,ignore
/// let lock = SleepLock::new("buffer", vec![0u8; 1024]);
/// let mut data = lock.lock();
/// device.read_block(dev, blockno, &mut data)?;
/// // data 超出作用域时释放锁
/// ```
pub struct SleepLock<T> {
    name: &'static str,
    inner: Mutex<T, Relax>,
}

impl<T> SleepLock<T> {
    /// 创建新的独占锁
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            name,
            inner: Mutex::new(data),
        }
    }

    /// 获取锁，必要时阻塞等待
    #[inline]
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        self.inner.lock()
    }

    /// 尝试获取锁，不等待
    #[inline]
    pub fn try_lock(&self) -> Option<SleepLockGuard<'_, T>> {
        self.inner.try_lock()
    }

    /// 锁当前是否被某个持有者占用
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// 锁名（调试用）
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> core::fmt::Debug for SleepLock<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SleepLock")
            .field("name", &self.name)
            .field("locked", &self.is_locked())
            .finish()
    }
}
