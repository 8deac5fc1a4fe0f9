//! オンメモリ版 DocumentStore 実装
//!
//! テストと `--ephemeral` 実行用。プロセス終了で内容は消える。
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::store::{Document, DocumentStore, dedup_by_key, merge_by_key};
use crate::error::{Result, VocabError};

pub struct MemoryStore<D: Document> {
    docs: Mutex<Vec<D>>,
}

impl<D: Document> Default for MemoryStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> MemoryStore<D> {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(Vec::new()),
        }
    }

    /// 初期データ付きで作成
    pub fn with_docs(docs: Vec<D>) -> Self {
        Self {
            docs: Mutex::new(dedup_by_key(docs)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<D>>> {
        self.docs
            .lock()
            .map_err(|e| VocabError::StoreFailed(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl<D: Document> DocumentStore<D> for MemoryStore<D> {
    async fn find_one(&self, key: &str) -> Result<Option<D>> {
        Ok(self.lock()?.iter().find(|d| d.key() == key).cloned())
    }

    async fn find_all(&self) -> Result<Vec<D>> {
        Ok(self.lock()?.clone())
    }

    async fn upsert_many(&self, docs: Vec<D>) -> Result<()> {
        merge_by_key(&mut *self.lock()?, docs);
        Ok(())
    }

    async fn replace_all(&self, docs: Vec<D>) -> Result<()> {
        *self.lock()? = dedup_by_key(docs);
        Ok(())
    }
}
