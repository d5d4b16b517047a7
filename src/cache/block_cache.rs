//! 块缓存实现
//!
//! # 结构
//!
//! ```text
//! struct BufferCache {
//!     bufs: [Buffer; N],          // 固定数组，初始化后不再分配或释放
//!     buckets: [Mutex<Bucket>; B], // 按 blockno % B 划分，每个桶一把短锁
//!     device,                     // 块设备驱动
//!     clock,                      // 滴答源，记录最近使用时间
//! }
//! ```
//!
//! # 两级锁
//!
//! - 桶锁：只保护桶内条目（身份、引用计数、最近使用时间），
//!   从不在持有期间做设备 I/O 或等待独占锁
//! - 独占锁：每个缓冲区一把，从分配成功一直持有到释放，可跨越设备 I/O
//!
//! 需要同时持有两个桶锁时（跨桶窃取），总是先锁下标小的桶，
//! 因此不会出现循环等待。

use super::bucket::{Bucket, Entry};
use super::buffer::{BlockKey, BufFlags, Buffer, BufferId};
use super::config::CacheConfig;
use super::guard::{BufGuard, BufHandle};
use crate::block::BlockDevice;
use crate::error::{Error, ErrorKind, Result};
use crate::sync::{TickCounter, TickSource};
use alloc::boxed::Box;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 查找次数（read + get）
    pub lookups: u64,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 在本桶内回收缓冲区的次数
    pub local_evictions: u64,
    /// 从其他桶窃取缓冲区的次数
    pub steals: u64,
    /// 设备读次数
    pub device_reads: u64,
    /// 设备写次数
    pub device_writes: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    local_evictions: AtomicU64,
    steals: AtomicU64,
    device_reads: AtomicU64,
    device_writes: AtomicU64,
}

impl Counters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            local_evictions: self.local_evictions.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            device_reads: self.device_reads.load(Ordering::Relaxed),
            device_writes: self.device_writes.load(Ordering::Relaxed),
        }
    }
}

/// 块缓存
///
/// 构造后以共享引用交给所有使用者；所有公开操作都只需要 `&self`。
///
/// # 使用约定
///
/// 1. [`read`](Self::read) 得到已加锁的缓冲区
/// 2. 修改数据后调用 [`write`](Self::write) 写回设备
/// 3. 用完后调用 [`release`](Self::release)（或直接 drop 守卫）
/// 4. 不要长时间持有缓冲区，其他线程访问同一个块时会等待
///
/// # 示例
///
/// ```rust,ignore
/// let cache = BufferCache::new(CacheConfig::default(), disk, TickCounter::new())?;
///
/// let mut buf = cache.read(1, 100)?;
/// buf.data_mut()[0] = 42;
/// cache.write(&mut buf)?;
/// cache.release(buf)?;
/// ```
pub struct BufferCache<D: BlockDevice, T: TickSource = TickCounter> {
    bufs: Box<[Buffer]>,
    buckets: Box<[Mutex<Bucket>]>,
    device: D,
    clock: T,
    block_size: usize,
    counters: Counters,
}

impl<D: BlockDevice, T: TickSource> BufferCache<D, T> {
    /// 创建块缓存
    ///
    /// 所有缓冲区初始时未绑定任何块，全部放在 0 号桶。
    ///
    /// # 参数
    ///
    /// * `config` - 缓冲区数量、桶数量、块大小
    /// * `device` - 块设备驱动
    /// * `clock` - 滴答源
    pub fn new(config: CacheConfig, device: D, clock: T) -> Result<Self> {
        config.validate()?;

        let bufs: Box<[Buffer]> = (0..config.nbuf)
            .map(|_| Buffer::new(config.block_size))
            .collect();

        let mut buckets: Box<[Mutex<Bucket>]> = (0..config.nbucket)
            .map(|_| Mutex::new(Bucket::new()))
            .collect();

        let first = buckets[0].get_mut();
        for id in 0..config.nbuf {
            first.push_front(Entry::unbound(id));
        }

        log::debug!(
            "[BCACHE] init: {} buffers x {} bytes, {} buckets",
            config.nbuf,
            config.block_size,
            config.nbucket
        );

        Ok(Self {
            bufs,
            buckets,
            device,
            clock,
            block_size: config.block_size,
            counters: Counters::default(),
        })
    }

    /// 读取块
    ///
    /// 返回绑定到 `(dev, blockno)` 的已加锁缓冲区，引用计数加 1。
    /// 数据无效时同步从设备读入；已有效时不访问设备。
    ///
    /// # 错误
    ///
    /// - `NoSpace` - 所有缓冲区都在使用中
    /// - 设备读失败时返回设备的错误，缓冲区保持无效并被释放
    pub fn read(&self, dev: u32, blockno: u32) -> Result<BufGuard<'_, D, T>> {
        let mut buf = self.alloc(BlockKey::new(dev, blockno))?;
        if !buf.is_valid() {
            Counters::bump(&self.counters.device_reads);
            self.device.read_block(dev, blockno, buf.raw_mut())?;
            self.buffer(buf.id()).insert(BufFlags::VALID);
        }
        Ok(buf)
    }

    /// 获取块但不读设备
    ///
    /// 适用于即将整体覆盖的块；返回的缓冲区可能无效，
    /// 可用 [`BufGuard::overwrite`] 或 [`BufGuard::zero`] 填充。
    pub fn get(&self, dev: u32, blockno: u32) -> Result<BufGuard<'_, D, T>> {
        self.alloc(BlockKey::new(dev, blockno))
    }

    /// 把缓冲区数据写回设备
    ///
    /// 不改变引用计数、不释放独占锁，数据保持有效，清除脏标志。
    ///
    /// # 错误
    ///
    /// - `InvalidState` - 缓冲区不属于此缓存
    /// - 设备写失败时返回设备的错误
    pub fn write(&self, buf: &mut BufGuard<'_, D, T>) -> Result<()> {
        self.check_owner(buf)?;
        Counters::bump(&self.counters.device_writes);
        self.device.write_block(buf.dev(), buf.blockno(), buf.data())?;
        let buffer = self.buffer(buf.id());
        buffer.insert(BufFlags::VALID);
        buffer.remove(BufFlags::DIRTY);
        log::trace!("[BCACHE] write dev={} blockno={}", buf.dev(), buf.blockno());
        Ok(())
    }

    /// 释放缓冲区
    ///
    /// 先释放独占锁，再减少引用计数；降为 0 时记录当前滴答值。
    /// 缓冲区在桶内的位置不变。
    ///
    /// # 错误
    ///
    /// - `InvalidState` - 缓冲区不属于此缓存（仍会归还给它所属的缓存）
    pub fn release(&self, buf: BufGuard<'_, D, T>) -> Result<()> {
        let owned = self.check_owner(&buf);
        drop(buf);
        owned
    }

    /// 增加引用计数，使缓冲区不会被回收
    ///
    /// 不涉及独占锁。
    ///
    /// # 错误
    ///
    /// - `InvalidState` - 句柄对应的缓冲区已绑定到别的块
    pub fn pin(&self, handle: BufHandle) -> Result<()> {
        let mut bucket = self.buckets[self.bucket_of(handle.key.blockno)].lock();
        let entry = Self::entry_for(&mut bucket, handle)?;
        entry.refcnt += 1;
        Ok(())
    }

    /// 减少 [`pin`](Self::pin) 增加的引用计数
    ///
    /// # 错误
    ///
    /// - `InvalidState` - 句柄失效，或引用计数已为 0
    pub fn unpin(&self, handle: BufHandle) -> Result<()> {
        let mut bucket = self.buckets[self.bucket_of(handle.key.blockno)].lock();
        let entry = Self::entry_for(&mut bucket, handle)?;
        if entry.refcnt == 0 {
            return Err(Error::new(ErrorKind::InvalidState, "unpin of unreferenced buffer"));
        }
        entry.refcnt -= 1;
        if entry.refcnt == 0 {
            entry.last_used = self.clock.ticks();
        }
        Ok(())
    }

    /// 查询块当前的引用计数；未缓存时返回 `None`
    pub fn refcount(&self, dev: u32, blockno: u32) -> Option<u32> {
        let key = BlockKey::new(dev, blockno);
        let bucket = self.buckets[self.bucket_of(blockno)].lock();
        bucket.find(key).map(|e| e.refcnt)
    }

    /// 块是否在缓存中
    pub fn is_cached(&self, dev: u32, blockno: u32) -> bool {
        self.refcount(dev, blockno).is_some()
    }

    /// 缓冲区总数
    pub fn capacity(&self) -> usize {
        self.bufs.len()
    }

    /// 桶数量
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 块大小（字节）
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 底层块设备
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 滴答源
    pub fn clock(&self) -> &T {
        &self.clock
    }

    /// 统计信息快照
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    // ===== 内部实现 =====

    pub(super) fn buffer(&self, id: BufferId) -> &Buffer {
        &self.bufs[id]
    }

    fn bucket_of(&self, blockno: u32) -> usize {
        blockno as usize % self.buckets.len()
    }

    fn check_owner(&self, buf: &BufGuard<'_, D, T>) -> Result<()> {
        if core::ptr::eq(buf.cache(), self) {
            Ok(())
        } else {
            log::error!("[BCACHE] buffer {} is not held through this cache", buf.id());
            Err(Error::new(ErrorKind::InvalidState, "buffer not held through this cache"))
        }
    }

    fn entry_for(bucket: &mut Bucket, handle: BufHandle) -> Result<&mut Entry> {
        match bucket.find_id_mut(handle.id) {
            Some(entry) if entry.key == Some(handle.key) => Ok(entry),
            _ => Err(Error::new(ErrorKind::InvalidState, "stale buffer handle")),
        }
    }

    /// 查找或分配缓冲区
    ///
    /// 1. 在本桶查找已绑定的缓冲区，命中则引用计数加 1
    /// 2. 未命中则在本桶回收最久未使用的空闲缓冲区
    /// 3. 本桶没有空闲缓冲区时从其他桶窃取
    ///
    /// 返回时独占锁已持有。
    fn alloc(&self, key: BlockKey) -> Result<BufGuard<'_, D, T>> {
        Counters::bump(&self.counters.lookups);
        let home = self.bucket_of(key.blockno);

        let mut bucket = self.buckets[home].lock();

        if let Some(entry) = bucket.find_mut(key) {
            entry.refcnt += 1;
            let id = entry.id;
            drop(bucket);
            Counters::bump(&self.counters.hits);
            log::trace!("[BCACHE] dev={} blockno={} HIT buf={}", key.dev, key.blockno, id);
            return Ok(self.lock_buffer(id, key));
        }

        if let Some(entry) = bucket.victim().and_then(|pos| bucket.get_mut(pos)) {
            self.rebind(entry, key);
            let id = entry.id;
            drop(bucket);
            Counters::bump(&self.counters.misses);
            Counters::bump(&self.counters.local_evictions);
            log::debug!(
                "[BCACHE] dev={} blockno={} MISS, recycled buf={} in bucket {}",
                key.dev,
                key.blockno,
                id,
                home
            );
            return Ok(self.lock_buffer(id, key));
        }

        drop(bucket);
        self.steal(home, key)
    }

    /// 跨桶窃取
    ///
    /// 按下标升序依次与每个其他桶配对，两把锁总是先锁下标小的。
    /// 本桶锁在两次尝试之间会被放开，所以每次拿到锁后都要重新检查本桶：
    /// 是否已有人绑定了 `key`，以及是否出现了空闲缓冲区。
    fn steal(&self, home: usize, key: BlockKey) -> Result<BufGuard<'_, D, T>> {
        for other in (0..self.buckets.len()).filter(|&i| i != home) {
            let (lo, hi) = if other < home { (other, home) } else { (home, other) };
            let mut lo_bucket = self.buckets[lo].lock();
            let mut hi_bucket = self.buckets[hi].lock();
            let (home_bucket, other_bucket) = if lo == home {
                (&mut *lo_bucket, &mut *hi_bucket)
            } else {
                (&mut *hi_bucket, &mut *lo_bucket)
            };

            if let Some(entry) = home_bucket.find_mut(key) {
                entry.refcnt += 1;
                let id = entry.id;
                drop(lo_bucket);
                drop(hi_bucket);
                Counters::bump(&self.counters.hits);
                log::trace!("[BCACHE] dev={} blockno={} HIT buf={} (late)", key.dev, key.blockno, id);
                return Ok(self.lock_buffer(id, key));
            }

            // 放锁期间本桶可能有缓冲区被释放
            if let Some(entry) = home_bucket.victim().and_then(|pos| home_bucket.get_mut(pos)) {
                self.rebind(entry, key);
                let id = entry.id;
                drop(lo_bucket);
                drop(hi_bucket);
                Counters::bump(&self.counters.misses);
                Counters::bump(&self.counters.local_evictions);
                return Ok(self.lock_buffer(id, key));
            }

            let Some(mut entry) = other_bucket.victim().and_then(|pos| other_bucket.remove(pos)) else {
                continue;
            };
            self.rebind(&mut entry, key);
            let id = entry.id;
            home_bucket.push_front(entry);
            drop(lo_bucket);
            drop(hi_bucket);

            Counters::bump(&self.counters.misses);
            Counters::bump(&self.counters.steals);
            log::debug!(
                "[BCACHE] dev={} blockno={} MISS, stole buf={} from bucket {} into {}",
                key.dev,
                key.blockno,
                id,
                other,
                home
            );
            return Ok(self.lock_buffer(id, key));
        }

        log::error!(
            "[BCACHE] no free buffer for dev={} blockno={}: all {} buffers referenced",
            key.dev,
            key.blockno,
            self.bufs.len()
        );
        Err(Error::new(ErrorKind::NoSpace, "no free buffer in cache"))
    }

    /// 把空闲条目重新绑定到 `key`
    ///
    /// 调用者持有条目所在桶的锁。旧内容不会写回。
    fn rebind(&self, entry: &mut Entry, key: BlockKey) {
        let old = self.bufs[entry.id].reset();
        if old.contains(BufFlags::DIRTY) {
            if let Some(prev) = entry.key {
                log::warn!(
                    "[BCACHE] recycling dirty buf={} (dev={} blockno={}) without write-back",
                    entry.id,
                    prev.dev,
                    prev.blockno
                );
            }
        }
        entry.key = Some(key);
        entry.refcnt = 1;
    }

    fn lock_buffer(&self, id: BufferId, key: BlockKey) -> BufGuard<'_, D, T> {
        let data = self.bufs[id].lock.lock();
        BufGuard::new(self, data, BufHandle { id, key })
    }

    /// 归还一次引用，由守卫在释放独占锁之后调用
    pub(super) fn put(&self, handle: BufHandle) {
        let mut bucket = self.buckets[self.bucket_of(handle.key.blockno)].lock();
        match bucket.find_id_mut(handle.id) {
            Some(entry) if entry.refcnt > 0 => {
                entry.refcnt -= 1;
                if entry.refcnt == 0 {
                    entry.last_used = self.clock.ticks();
                }
            }
            _ => log::error!(
                "[BCACHE] release of unreferenced buf={} (dev={} blockno={})",
                handle.id,
                handle.key.dev,
                handle.key.blockno
            ),
        }
    }
}

impl<D: BlockDevice, T: TickSource> core::fmt::Debug for BufferCache<D, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferCache")
            .field("capacity", &self.bufs.len())
            .field("buckets", &self.buckets.len())
            .field("block_size", &self.block_size)
            .field("stats", &self.counters.snapshot())
            .finish()
    }
}
