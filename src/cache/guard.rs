//! 已加锁缓冲区 - RAII 风格的块访问
//!
//! [`BufGuard`] 代表对一个缓冲区的独占使用权：
//! - 由 [`BufferCache::read`] / [`BufferCache::get`] 返回，此时独占锁已持有、引用计数已加 1
//! - 持有期间可以读写块数据
//! - 交给 [`BufferCache::release`] 或直接 drop 时，先释放独占锁，再在桶锁下减少引用计数
//!
//! 因为只能通过守卫访问数据，"未持锁就写回/释放"在类型层面无法表达。

use super::block_cache::BufferCache;
use super::buffer::{BlockKey, BufFlags, BufferId};
use crate::block::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::sync::{SleepLockGuard, TickSource};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

/// 缓冲区句柄
///
/// 不持有独占锁，仅用于 [`BufferCache::pin`] / [`BufferCache::unpin`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufHandle {
    pub(super) id: BufferId,
    pub(super) key: BlockKey,
}

impl BufHandle {
    /// 缓冲区 ID
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// 绑定的块
    pub fn key(&self) -> BlockKey {
        self.key
    }
}

/// 已加锁的缓冲区
///
/// # 示例
///
/// ```rust,ignore
/// let mut buf = cache.read(1, 100)?;
/// buf.write_u32(0, 0xdead_beef)?;
/// cache.write(&mut buf)?;
/// cache.release(buf)?;
/// ```
pub struct BufGuard<'a, D: BlockDevice, T: TickSource> {
    // 字段按声明顺序 drop：先放独占锁，再减引用计数
    data: SleepLockGuard<'a, Vec<u8>>,
    owner: Owner<'a, D, T>,
}

/// 在 drop 时归还引用计数
struct Owner<'a, D: BlockDevice, T: TickSource> {
    cache: &'a BufferCache<D, T>,
    handle: BufHandle,
}

impl<D: BlockDevice, T: TickSource> Drop for Owner<'_, D, T> {
    fn drop(&mut self) {
        self.cache.put(self.handle);
    }
}

impl<'a, D: BlockDevice, T: TickSource> BufGuard<'a, D, T> {
    pub(super) fn new(
        cache: &'a BufferCache<D, T>,
        data: SleepLockGuard<'a, Vec<u8>>,
        handle: BufHandle,
    ) -> Self {
        Self {
            data,
            owner: Owner { cache, handle },
        }
    }

    pub(super) fn cache(&self) -> &'a BufferCache<D, T> {
        self.owner.cache
    }

    pub(super) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 设备号
    pub fn dev(&self) -> u32 {
        self.owner.handle.key.dev
    }

    /// 块号
    pub fn blockno(&self) -> u32 {
        self.owner.handle.key.blockno
    }

    /// 绑定的块
    pub fn key(&self) -> BlockKey {
        self.owner.handle.key
    }

    /// 缓冲区 ID
    pub fn id(&self) -> BufferId {
        self.owner.handle.id
    }

    /// 用于 pin/unpin 的句柄
    pub fn handle(&self) -> BufHandle {
        self.owner.handle
    }

    /// 状态标志
    pub fn flags(&self) -> BufFlags {
        self.cache().buffer(self.id()).flags()
    }

    /// 数据是否有效
    pub fn is_valid(&self) -> bool {
        self.flags().contains(BufFlags::VALID)
    }

    /// 数据是否被修改且尚未写回
    pub fn is_dirty(&self) -> bool {
        self.flags().contains(BufFlags::DIRTY)
    }

    /// 只读访问块数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 可变访问块数据，标记为脏
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.cache().buffer(self.id()).insert(BufFlags::DIRTY);
        &mut self.data
    }

    /// 用 `src` 覆盖整个块，之后数据视为有效
    ///
    /// 配合 [`BufferCache::get`] 使用，省去一次设备读。
    pub fn overwrite(&mut self, src: &[u8]) -> Result<()> {
        if src.len() != self.data.len() {
            return Err(Error::new(ErrorKind::InvalidInput, "source length must equal block size"));
        }
        self.data.copy_from_slice(src);
        self.cache()
            .buffer(self.id())
            .insert(BufFlags::VALID | BufFlags::DIRTY);
        Ok(())
    }

    /// 把整个块清零，之后数据视为有效
    pub fn zero(&mut self) {
        self.data.fill(0);
        self.cache()
            .buffer(self.id())
            .insert(BufFlags::VALID | BufFlags::DIRTY);
    }

    fn range(&self, offset: usize, width: usize) -> Result<core::ops::Range<usize>> {
        match offset.checked_add(width) {
            Some(end) if end <= self.data.len() => Ok(offset..end),
            _ => Err(Error::new(ErrorKind::InvalidInput, "access beyond block boundary")),
        }
    }

    /// 读取小端 u16
    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let range = self.range(offset, 2)?;
        Ok(LittleEndian::read_u16(&self.data[range]))
    }

    /// 读取小端 u32
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let range = self.range(offset, 4)?;
        Ok(LittleEndian::read_u32(&self.data[range]))
    }

    /// 读取小端 u64
    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        let range = self.range(offset, 8)?;
        Ok(LittleEndian::read_u64(&self.data[range]))
    }

    /// 写入小端 u16
    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<()> {
        let range = self.range(offset, 2)?;
        LittleEndian::write_u16(&mut self.data_mut()[range], value);
        Ok(())
    }

    /// 写入小端 u32
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let range = self.range(offset, 4)?;
        LittleEndian::write_u32(&mut self.data_mut()[range], value);
        Ok(())
    }

    /// 写入小端 u64
    pub fn write_u64(&mut self, offset: usize, value: u64) -> Result<()> {
        let range = self.range(offset, 8)?;
        LittleEndian::write_u64(&mut self.data_mut()[range], value);
        Ok(())
    }
}

impl<D: BlockDevice, T: TickSource> core::fmt::Debug for BufGuard<'_, D, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufGuard")
            .field("id", &self.id())
            .field("key", &self.key())
            .field("flags", &self.flags())
            .finish()
    }
}
