//! 块设备驱动接口

use crate::error::Result;
use alloc::sync::Arc;

/// 块设备驱动接口
///
/// 实现此 trait 以提供底层块设备访问。缓存只会在持有缓冲区独占锁、
/// 且不持有任何桶锁时调用这两个方法，因此实现可以安全地阻塞。
///
/// 同一个驱动可以服务多个设备，由 `dev` 区分。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockDevice, Result};
///
/// struct VirtioDisk {
///     // ...
/// }
///
/// impl BlockDevice for VirtioDisk {
///     fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()> {
///         // 提交读请求并等待完成
///         Ok(())
///     }
///
///     fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()> {
///         // 提交写请求并等待完成
///         Ok(())
///     }
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// 同步读取一个块
    ///
    /// # 参数
    ///
    /// * `dev` - 设备号
    /// * `blockno` - 块号
    /// * `buf` - 目标缓冲区（长度等于缓存的块大小）
    fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()>;

    /// 同步写入一个块
    ///
    /// # 参数
    ///
    /// * `dev` - 设备号
    /// * `blockno` - 块号
    /// * `buf` - 源缓冲区（长度等于缓存的块大小）
    fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    #[inline]
    fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(dev, blockno, buf)
    }

    #[inline]
    fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()> {
        (**self).write_block(dev, blockno, buf)
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for Arc<D> {
    #[inline]
    fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(dev, blockno, buf)
    }

    #[inline]
    fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()> {
        (**self).write_block(dev, blockno, buf)
    }
}
