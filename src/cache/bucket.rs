//! 哈希桶
//!
//! 每个桶按插入顺序保存落在该桶内的缓冲区，以及桶锁保护的元数据：
//! 绑定的块身份、引用计数、最近使用时间。
//! 缓冲区迁移到别的桶时，元数据随条目一起移动。

use super::buffer::{BlockKey, BufferId};
use alloc::collections::VecDeque;

/// 桶内条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// 缓冲区 ID
    pub id: BufferId,
    /// 绑定的块，`None` 表示初始化后从未使用
    pub key: Option<BlockKey>,
    /// 引用计数
    pub refcnt: u32,
    /// 引用计数降为 0 时的滴答值
    pub last_used: u64,
}

impl Entry {
    /// 未绑定的空闲条目
    pub const fn unbound(id: BufferId) -> Self {
        Self {
            id,
            key: None,
            refcnt: 0,
            last_used: 0,
        }
    }

    /// 是否可以被驱逐
    pub fn is_free(&self) -> bool {
        self.refcnt == 0
    }
}

/// 哈希桶
#[derive(Debug)]
pub struct Bucket {
    entries: VecDeque<Entry>,
}

impl Bucket {
    /// 创建空桶
    pub const fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// 查找绑定到 `key` 的条目
    pub fn find_mut(&mut self, key: BlockKey) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.key == Some(key))
    }

    /// 只读查找绑定到 `key` 的条目
    pub fn find(&self, key: BlockKey) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == Some(key))
    }

    /// 按缓冲区 ID 查找条目
    pub fn find_id_mut(&mut self, id: BufferId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// 选择驱逐对象
    ///
    /// 在引用计数为 0 的条目中取 `last_used` 最小者；
    /// 相同时取扫描顺序中的第一个。返回条目位置。
    pub fn victim(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_free())
            .min_by_key(|(_, e)| e.last_used)
            .map(|(pos, _)| pos)
    }

    /// 按位置访问条目
    pub fn get_mut(&mut self, pos: usize) -> Option<&mut Entry> {
        self.entries.get_mut(pos)
    }

    /// 取出条目，其余条目保持原有顺序
    pub fn remove(&mut self, pos: usize) -> Option<Entry> {
        self.entries.remove(pos)
    }

    /// 插入到桶头
    pub fn push_front(&mut self, entry: Entry) {
        self.entries.push_front(entry);
    }
}
