//! 缓冲区结构
//!
//! 每个缓冲区保存一个块的内存副本。身份（设备号、块号）与引用计数
//! 由所属桶的锁保护，见 [`super::bucket`]；这里只保存随缓冲区本身
//! 移动的部分：状态标志和受独占锁保护的数据。

use crate::sync::SleepLock;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicU8, Ordering};

/// 缓冲区 ID，即缓冲区在缓存数组中的下标
pub type BufferId = usize;

/// 块的身份：设备号 + 块号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    /// 设备号
    pub dev: u32,
    /// 块号
    pub blockno: u32,
}

impl BlockKey {
    /// 创建块身份
    pub const fn new(dev: u32, blockno: u32) -> Self {
        Self { dev, blockno }
    }
}

bitflags! {
    /// 缓冲区状态标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufFlags: u8 {
        /// 数据与设备一致（有效）
        const VALID = 0x01;
        /// 数据被使用者修改过，尚未写回
        const DIRTY = 0x02;
    }
}

/// 缓冲区
///
/// 标志位使用原子变量保存：重新绑定时在桶锁下清除 `VALID`，
/// 此时缓冲区引用计数为 0，没有任何持有者；
/// 其余修改都发生在持有独占锁期间。
pub struct Buffer {
    flags: AtomicU8,
    /// 块数据，由独占锁保护
    pub(super) lock: SleepLock<Vec<u8>>,
}

impl Buffer {
    /// 创建未绑定的缓冲区
    pub fn new(block_size: usize) -> Self {
        Self {
            flags: AtomicU8::new(BufFlags::empty().bits()),
            lock: SleepLock::new("buffer", alloc::vec![0u8; block_size]),
        }
    }

    /// 当前状态标志
    pub fn flags(&self) -> BufFlags {
        BufFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    /// 设置标志
    pub fn insert(&self, flags: BufFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// 清除标志
    pub fn remove(&self, flags: BufFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// 清除所有标志，返回之前的值
    pub fn reset(&self) -> BufFlags {
        BufFlags::from_bits_truncate(self.flags.swap(0, Ordering::AcqRel))
    }

    /// 数据是否有效
    pub fn is_valid(&self) -> bool {
        self.flags().contains(BufFlags::VALID)
    }

    /// 数据是否为脏
    pub fn is_dirty(&self) -> bool {
        self.flags().contains(BufFlags::DIRTY)
    }

    /// 独占锁当前是否被持有
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Buffer")
            .field("flags", &self.flags())
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_creation() {
        let buf = Buffer::new(1024);
        assert_eq!(buf.flags(), BufFlags::empty());
        assert!(!buf.is_valid());
        assert!(!buf.is_locked());
        assert_eq!(buf.lock.lock().len(), 1024);
    }

    #[test]
    fn test_flags() {
        let buf = Buffer::new(64);

        buf.insert(BufFlags::VALID);
        assert!(buf.is_valid());
        assert!(!buf.is_dirty());

        buf.insert(BufFlags::DIRTY);
        assert!(buf.is_dirty());

        buf.remove(BufFlags::DIRTY);
        assert!(!buf.is_dirty());
        assert!(buf.is_valid());
    }

    #[test]
    fn test_reset_returns_previous() {
        let buf = Buffer::new(64);
        buf.insert(BufFlags::VALID | BufFlags::DIRTY);

        let old = buf.reset();
        assert_eq!(old, BufFlags::VALID | BufFlags::DIRTY);
        assert_eq!(buf.flags(), BufFlags::empty());
    }
}
