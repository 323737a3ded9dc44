//! # 存储模块
//!
//! 有容量上限、按 FIFO 淘汰的记录存储：
//!
//! - `Deduplicator` - 本次会话见过的标识集合
//! - `RecordStore` - 去重、前插、截断并持久化
//! - `backend` - 存储后端（内存、redb）
//!
//! 持久化格式为按“最新在前”排列的 JSON 数组，保存在单个存储键下。

pub mod backend;

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info};

use crate::core::Record;
use crate::error::{HarvestError, HarvestResult};

pub use backend::{MemoryBackend, RedbBackend, StorageBackend};

/// 已见标识集合
///
/// 被淘汰的标识在本次会话内仍视为已见，避免同一页面反复收录。
#[derive(Debug, Default, Clone)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 首次出现时返回 true 并记住该标识
    pub fn admit(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        true
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn forget_all(&mut self) {
        self.seen.clear();
    }
}

/// 单次插入的结果
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InsertReport {
    pub added: usize,
    pub evicted: usize,
}

/// 有界 FIFO 记录存储
pub struct RecordStore<B> {
    backend: B,
    key: String,
    capacity: usize,
    records: VecDeque<Record>,
    dedup: Deduplicator,
}

impl<B: StorageBackend> RecordStore<B> {
    /// 打开存储键，并对已持久化的内容重新执行唯一性和容量约束
    pub fn open(backend: B, key: &str, capacity: usize) -> HarvestResult<Self> {
        if capacity == 0 {
            return Err(HarvestError::Config("存储容量必须大于0".to_string()));
        }

        let mut store = RecordStore {
            backend,
            key: key.to_string(),
            capacity,
            records: VecDeque::new(),
            dedup: Deduplicator::new(),
        };
        store.reload()?;
        Ok(store)
    }

    /// 重新读取后端中的内容
    pub fn reload(&mut self) -> HarvestResult<()> {
        let loaded: Vec<Record> = match self.backend.load(&self.key)? {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(&text)?,
            _ => Vec::new(),
        };

        self.records.clear();
        self.dedup.forget_all();
        for record in loaded {
            if self.records.len() == self.capacity {
                break;
            }
            if self.dedup.admit(&record.id) {
                self.records.push_back(record);
            }
        }

        debug!("存储 {} 载入 {} 条记录", self.key, self.records.len());
        Ok(())
    }

    /// 插入一批记录
    ///
    /// 已见标识被忽略；新记录按插入顺序依次放到最前，超出容量时丢弃最旧的记录。
    /// 没有新记录时不会写入后端。
    pub fn insert<I>(&mut self, records: I) -> HarvestResult<InsertReport>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut report = InsertReport::default();

        for record in records {
            if !self.dedup.admit(&record.id) {
                continue;
            }
            self.records.push_front(record);
            report.added += 1;

            while self.records.len() > self.capacity {
                self.records.pop_back();
                report.evicted += 1;
            }
        }

        if report.added > 0 {
            self.persist()?;
            info!(
                "新增 {} 条记录，总计 {} 条",
                report.added,
                self.records.len()
            );
        }

        Ok(report)
    }

    /// 清空存储并忘记全部已见标识
    pub fn clear(&mut self) -> HarvestResult<()> {
        self.records.clear();
        self.dedup.forget_all();
        self.persist()
    }

    fn persist(&self) -> HarvestResult<()> {
        let text = serde_json::to_string(&self.records)?;
        self.backend.save(&self.key, &text)
    }

    /// 最新在前
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// 最新在前
    pub fn records(&self) -> Vec<Record> {
        self.records.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Record> {
        self.records.front()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|record| record.id == id)
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.dedup.has_seen(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str) -> Record {
        Record::new(id, format!("https://example.com/{}", id))
    }

    fn ids<B: StorageBackend>(store: &RecordStore<B>) -> Vec<String> {
        store.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn five_into_three_keeps_last_three() {
        let mut store = RecordStore::open(MemoryBackend::new(), "k", 3).unwrap();
        let report = store
            .insert(["a", "b", "c", "d", "e"].map(rec))
            .unwrap();
        assert_eq!(report, InsertReport { added: 5, evicted: 2 });
        assert_eq!(ids(&store), vec!["e", "d", "c"]);
    }

    #[test]
    fn reinsert_is_noop() {
        let backend = MemoryBackend::new();
        let mut store = RecordStore::open(backend.clone(), "k", 3).unwrap();
        store.insert([rec("a"), rec("b")]).unwrap();
        let before = backend.load("k").unwrap();

        let report = store.insert([rec("a")]).unwrap();
        assert_eq!(report, InsertReport::default());
        assert_eq!(ids(&store), vec!["b", "a"]);
        assert_eq!(backend.load("k").unwrap(), before);
    }

    #[test]
    fn duplicates_inside_one_batch() {
        let mut store = RecordStore::open(MemoryBackend::new(), "k", 10).unwrap();
        let report = store.insert([rec("a"), rec("a"), rec("b")]).unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn evicted_ids_stay_seen() {
        let mut store = RecordStore::open(MemoryBackend::new(), "k", 1).unwrap();
        store.insert([rec("a"), rec("b")]).unwrap();
        assert!(!store.contains("a"));
        assert!(store.has_seen("a"));
        assert_eq!(store.insert([rec("a")]).unwrap().added, 0);
    }

    #[test]
    fn persisted_state_is_shared() {
        let backend = MemoryBackend::new();
        let mut writer = RecordStore::open(backend.clone(), "k", 5).unwrap();
        writer.insert([rec("a"), rec("b")]).unwrap();

        let reader = RecordStore::open(backend, "k", 5).unwrap();
        assert_eq!(ids(&reader), vec!["b", "a"]);
        assert_eq!(reader.latest().map(|r| r.id.as_str()), Some("b"));
    }

    #[test]
    fn reopening_with_smaller_capacity_trims_oldest() {
        let backend = MemoryBackend::new();
        let mut store = RecordStore::open(backend.clone(), "k", 5).unwrap();
        store.insert(["a", "b", "c", "d"].map(rec)).unwrap();

        let smaller = RecordStore::open(backend, "k", 2).unwrap();
        assert_eq!(ids(&smaller), vec!["d", "c"]);
    }

    #[test]
    fn clear_forgets_everything() {
        let backend = MemoryBackend::new();
        let mut store = RecordStore::open(backend.clone(), "k", 5).unwrap();
        store.insert([rec("a")]).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(backend.load("k").unwrap().as_deref(), Some("[]"));
        assert_eq!(store.insert([rec("a")]).unwrap().added, 1);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(RecordStore::open(MemoryBackend::new(), "k", 0).is_err());
    }
}
