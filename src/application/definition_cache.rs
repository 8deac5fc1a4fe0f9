//! 単語定義キャッシュ
//!
//! # 責任
//! - 永続化済み定義のオンメモリミラー保持（起動時に全件読み込み）
//! - ミス時の外部辞書問い合わせと正規化
//! - 取得できた定義だけを書き込む（失敗は次回リトライ）
//!
//! 同じ未キャッシュ語への同時要求は重複問い合わせを許容する。
//! 永続化は upsert なので後勝ちで壊れない。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::application::traits::DefinitionLookup;
use crate::domain::definition::{CachedDefinition, Definition};
use crate::domain::store::DocumentStore;
use crate::error::{Result, VocabError};

pub struct DefinitionCache {
    lookup: Arc<dyn DefinitionLookup>,
    store: Arc<dyn DocumentStore<CachedDefinition>>,
    /// 永続化内容のミラー。正本はストア側
    mirror: RwLock<HashMap<String, Definition>>,
}

impl DefinitionCache {
    /// 空のミラーで作成。起動時は続けて `load()` を呼ぶ
    pub fn new(
        lookup: Arc<dyn DefinitionLookup>,
        store: Arc<dyn DocumentStore<CachedDefinition>>,
    ) -> Self {
        Self {
            lookup,
            store,
            mirror: RwLock::new(HashMap::new()),
        }
    }

    /// 永続化済みの全定義をミラーに読み込み、件数を返す
    pub async fn load(&self) -> Result<usize> {
        let records = self.store.find_all().await?;
        let mut mirror = self.write_mirror()?;
        for record in records {
            mirror.insert(record.word, record.definition);
        }
        tracing::info!(count = mirror.len(), "loaded definition cache");
        Ok(mirror.len())
    }

    /// ミラーに載っている定義だけを返す（外部問い合わせなし）
    pub fn cached(&self, word: &str) -> Option<Definition> {
        self.mirror.read().ok()?.get(word).cloned()
    }

    pub fn len(&self) -> usize {
        self.mirror.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 単語の定義を取得
    ///
    /// - キャッシュ済みならそのまま返す
    /// - 外部辞書の失敗・空応答は `Ok(None)`（キャッシュしない）
    /// - 永続化の失敗は `Err`（ミラーにも載せない）
    pub async fn get(&self, word: &str) -> Result<Option<Definition>> {
        let hit = self.read_mirror()?.get(word).cloned();
        if hit.is_some() {
            return Ok(hit);
        }

        let raw = match self.lookup.lookup(word).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(word, error = %e, "definition lookup failed");
                return Ok(None);
            }
        };

        let Some(definition) = Definition::from_raw(&raw) else {
            tracing::debug!(word, "no definition found");
            return Ok(None);
        };

        self.store
            .upsert(CachedDefinition::new(word, definition.clone()))
            .await?;
        self.write_mirror()?
            .insert(word.to_string(), definition.clone());
        Ok(Some(definition))
    }

    fn read_mirror(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Definition>>> {
        self.mirror
            .read()
            .map_err(|e| VocabError::SystemError(format!("Lock error: {}", e)))
    }

    fn write_mirror(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Definition>>> {
        self.mirror
            .write()
            .map_err(|e| VocabError::SystemError(format!("Lock error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::service_container::test_helpers::{FailingStore, MockLookup};
    use crate::infrastructure::store::MemoryStore;

    #[tokio::test]
    async fn miss_fetches_normalizes_and_persists() {
        let lookup = Arc::new(MockLookup::new().with_definition("apple", "noun", "A fruit."));
        let store = Arc::new(MemoryStore::<CachedDefinition>::new());
        let cache = DefinitionCache::new(lookup.clone(), store.clone());

        let def = cache.get("apple").await.unwrap().unwrap();
        assert_eq!(def.first_meaning().unwrap().definition, "A fruit.");
        assert_eq!(store.find_all().await.unwrap().len(), 1);

        // 2 回目はミラーから
        cache.get("apple").await.unwrap().unwrap();
        assert_eq!(lookup.calls("apple"), 1);
    }

    #[tokio::test]
    async fn failed_lookup_is_not_cached_and_retried_later() {
        let lookup = Arc::new(MockLookup::new().with_definition("banana", "noun", "Yellow."));
        lookup.fail_next("banana", 1);
        let store = Arc::new(MemoryStore::<CachedDefinition>::new());
        let cache = DefinitionCache::new(lookup.clone(), store.clone());

        assert!(cache.get("banana").await.unwrap().is_none());
        assert!(store.find_all().await.unwrap().is_empty());
        assert!(cache.cached("banana").is_none());

        let def = cache.get("banana").await.unwrap();
        assert!(def.is_some());
        assert_eq!(store.find_all().await.unwrap().len(), 1);
        assert_eq!(lookup.calls("banana"), 2);
    }

    #[tokio::test]
    async fn unknown_word_is_none_and_not_persisted() {
        let lookup = Arc::new(MockLookup::new());
        let store = Arc::new(MemoryStore::<CachedDefinition>::new());
        let cache = DefinitionCache::new(lookup, store.clone());

        assert!(cache.get("zzzz").await.unwrap().is_none());
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_fills_mirror_without_lookups() {
        let definition = Definition {
            word: "cherry".into(),
            phonetic: String::new(),
            meanings: vec![],
        };
        let store = Arc::new(MemoryStore::with_docs(vec![CachedDefinition::new(
            "cherry", definition,
        )]));
        let lookup = Arc::new(MockLookup::new());
        let cache = DefinitionCache::new(lookup.clone(), store);

        assert_eq!(cache.load().await.unwrap(), 1);
        assert!(cache.get("cherry").await.unwrap().is_some());
        assert_eq!(lookup.calls("cherry"), 0);
    }

    #[tokio::test]
    async fn persist_failure_is_an_error_and_not_mirrored() {
        let lookup = Arc::new(MockLookup::new().with_definition("date", "noun", "A day."));
        let cache = DefinitionCache::new(lookup, Arc::new(FailingStore));

        assert!(matches!(
            cache.get("date").await,
            Err(VocabError::StoreFailed(_))
        ));
        assert!(cache.cached("date").is_none());
    }
}
