//! 存储后端
//!
//! 每个存储键映射为一段文本。`MemoryBackend` 的克隆共享同一份数据，
//! `RedbBackend` 把每个键保存为 redb 表中的一行。

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableTable, TableDefinition, TableError};
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};

const RECORDS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("records");

/// 键值存储接口
pub trait StorageBackend {
    fn load(&self, key: &str) -> HarvestResult<Option<String>>;
    fn save(&self, key: &str, text: &str) -> HarvestResult<()>;
    fn remove(&self, key: &str) -> HarvestResult<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for &B {
    fn load(&self, key: &str) -> HarvestResult<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, text: &str) -> HarvestResult<()> {
        (**self).save(key, text)
    }

    fn remove(&self, key: &str) -> HarvestResult<()> {
        (**self).remove(key)
    }
}

/// 进程内存储
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> HarvestResult<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| HarvestError::PersistenceFailure("内存存储锁已损坏".to_string()))?;
        Ok(f(&mut entries))
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> HarvestResult<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn save(&self, key: &str, text: &str) -> HarvestResult<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), text.to_string());
        })
    }

    fn remove(&self, key: &str) -> HarvestResult<()> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

/// 基于 redb 的磁盘存储
pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// 打开或创建数据库文件
    pub fn open(path: &Path) -> HarvestResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        debug!("打开存储文件: {}", path.display());
        let db = Database::create(path)?;
        Ok(RedbBackend { db })
    }

    /// 列出已有的存储键
    pub fn keys(&self) -> HarvestResult<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(RECORDS_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}

impl StorageBackend for RedbBackend {
    fn load(&self, key: &str) -> HarvestResult<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(RECORDS_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = table.get(key)?.map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn save(&self, key: &str, text: &str) -> HarvestResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS_TABLE)?;
            table.insert(key, text)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> HarvestResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RECORDS_TABLE)?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clones_share_state() {
        let a = MemoryBackend::new();
        let b = a.clone();
        a.save("k", "[1]").unwrap();
        assert_eq!(b.load("k").unwrap().as_deref(), Some("[1]"));
        b.remove("k").unwrap();
        assert_eq!(a.load("k").unwrap(), None);
    }

    #[test]
    fn redb_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.redb");
        let backend = RedbBackend::open(&path).unwrap();

        assert_eq!(backend.load("missing").unwrap(), None);
        assert!(backend.keys().unwrap().is_empty());

        backend.save("XHS", "[]").unwrap();
        backend.save("XHS", "[\"x\"]").unwrap();
        assert_eq!(backend.load("XHS").unwrap().as_deref(), Some("[\"x\"]"));
        assert_eq!(backend.keys().unwrap(), vec!["XHS".to_string()]);

        backend.remove("XHS").unwrap();
        assert_eq!(backend.load("XHS").unwrap(), None);
    }
}
