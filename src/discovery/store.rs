//! 版本感知的状态存储
//!
//! 状态存储是 `BackendIdentity -> BackendRecord` 的唯一权威映射。
//! 事件源只保证同一标识的版本令牌单调不减，乱序和重复投递都靠这里的
//! 版本比较过滤：只有严格更新的版本才会被接受。

use std::collections::HashMap;

use crate::discovery::instance::{BackendIdentity, BackendRecord, VersionToken};

/// 事件应用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// 新增记录
    Inserted,
    /// 整体替换已有记录
    Replaced,
    /// 删除记录
    Removed,
    /// 版本不新于已存储版本，丢弃
    Stale,
    /// 删除一个不存在的标识，无操作
    Absent,
}

impl ApplyOutcome {
    /// 存储内容是否发生变化
    pub fn changed(&self) -> bool {
        matches!(
            self,
            ApplyOutcome::Inserted | ApplyOutcome::Replaced | ApplyOutcome::Removed
        )
    }
}

/// 状态存储
///
/// 只在 watcher 任务内部访问，因此不需要加锁。
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    records: HashMap<BackendIdentity, BackendRecord>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新增或修改
    pub fn upsert(&mut self, record: BackendRecord) -> ApplyOutcome {
        match self.records.get(&record.identity) {
            Some(current) if record.version <= current.version => ApplyOutcome::Stale,
            Some(_) => {
                self.records.insert(record.identity.clone(), record);
                ApplyOutcome::Replaced
            }
            None => {
                self.records.insert(record.identity.clone(), record);
                ApplyOutcome::Inserted
            }
        }
    }

    /// 删除
    ///
    /// 落后于已存储版本的删除事件（与更新的 upsert 竞争）会被丢弃。
    pub fn remove(&mut self, identity: &BackendIdentity, version: &VersionToken) -> ApplyOutcome {
        match self.records.get(identity) {
            None => ApplyOutcome::Absent,
            Some(current) if *version <= current.version => ApplyOutcome::Stale,
            Some(_) => {
                self.records.remove(identity);
                ApplyOutcome::Removed
            }
        }
    }

    /// 用一份完整快照整体替换存储内容
    ///
    /// 快照内同一标识出现多次时保留版本最大的一条。
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = BackendRecord>) {
        self.records.clear();
        for record in records {
            self.upsert(record);
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, identity: &BackendIdentity) -> Option<&BackendRecord> {
        self.records.get(identity)
    }

    pub fn contains(&self, identity: &BackendIdentity) -> bool {
        self.records.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 遍历所有记录（无序）
    pub fn records(&self) -> impl Iterator<Item = &BackendRecord> {
        self.records.values()
    }
}
