//! 内存块设备
//!
//! 把块保存在内存中的 [`BlockDevice`] 实现，并统计实际发生的读写次数。
//! 主要用于宿主环境和测试。

use super::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

/// 内存块设备
///
/// 未写过的块读出为全零。块号不小于 `total_blocks` 的访问返回 `Io` 错误。
pub struct RamDisk {
    block_size: usize,
    total_blocks: u32,
    blocks: Mutex<BTreeMap<(u32, u32), Vec<u8>>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl RamDisk {
    /// 创建内存块设备
    ///
    /// # 参数
    ///
    /// * `block_size` - 块大小（字节）
    /// * `total_blocks` - 每个设备号下的块数
    pub fn new(block_size: usize, total_blocks: u32) -> Self {
        Self {
            block_size,
            total_blocks,
            blocks: Mutex::new(BTreeMap::new()),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// 块大小
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 物理读取次数
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// 物理写入次数
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// 绕过计数器直接查看块内容
    pub fn peek(&self, dev: u32, blockno: u32) -> Vec<u8> {
        self.blocks
            .lock()
            .get(&(dev, blockno))
            .cloned()
            .unwrap_or_else(|| vec![0u8; self.block_size])
    }

    fn check(&self, blockno: u32, len: usize) -> Result<()> {
        if blockno >= self.total_blocks {
            return Err(Error::new(ErrorKind::Io, "block number out of range"));
        }
        if len != self.block_size {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer length must equal block size"));
        }
        Ok(())
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, dev: u32, blockno: u32, buf: &mut [u8]) -> Result<()> {
        self.check(blockno, buf.len())?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        match self.blocks.lock().get(&(dev, blockno)) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_block(&self, dev: u32, blockno: u32, buf: &[u8]) -> Result<()> {
        self.check(blockno, buf.len())?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.blocks.lock().insert((dev, blockno), buf.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwritten_block_reads_zero() {
        let disk = RamDisk::new(512, 16);
        let mut buf = vec![0xAAu8; 512];
        disk.read_block(1, 3, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(disk.read_count(), 1);
        assert_eq!(disk.write_count(), 0);
    }

    #[test]
    fn test_devices_are_separate() {
        let disk = RamDisk::new(512, 16);
        disk.write_block(1, 3, &[7u8; 512]).unwrap();

        let mut buf = vec![0u8; 512];
        disk.read_block(2, 3, &mut buf).unwrap();
        assert_eq!(buf[0], 0);
        disk.read_block(1, 3, &mut buf).unwrap();
        assert_eq!(buf[0], 7);
        assert_eq!(disk.peek(1, 3)[511], 7);
    }

    #[test]
    fn test_out_of_range() {
        let disk = RamDisk::new(512, 4);
        let mut buf = vec![0u8; 512];
        let err = disk.read_block(1, 4, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(disk.read_count(), 0);
    }

    #[test]
    fn test_wrong_length() {
        let disk = RamDisk::new(512, 4);
        let err = disk.write_block(1, 0, &[0u8; 100]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
