//! サービスコンテナ
//!
//! # 責任
//! - 全ての依存関係の構築と管理
//! - サービス間の依存関係の解決
//! - テスト時のモック注入サポート

use std::sync::Arc;

use crate::application::{
    ChannelRotationManager, DefinitionCache, DistributionOrchestrator, MessageComposer,
    SubscriberRotationManager,
    traits::{DefinitionLookup, MessageTransport},
};
use crate::domain::{
    CachedDefinition, ChannelWord, DocumentStore, SubscriberState, catalog::WordCatalog,
};
use crate::error::Result;
use crate::infrastructure::{
    config::AppConfig,
    external::DictionaryApiClient,
    store::{JsonFileStore, MemoryStore},
};

/// 永続化ストア一式
#[derive(Clone)]
pub struct Stores {
    pub subscribers: Arc<dyn DocumentStore<SubscriberState>>,
    pub channel_words: Arc<dyn DocumentStore<ChannelWord>>,
    pub definitions: Arc<dyn DocumentStore<CachedDefinition>>,
}

impl Stores {
    /// `dir` 配下の JSON ファイルに保存する
    pub fn json(dir: &std::path::Path) -> Result<Self> {
        Ok(Self {
            subscribers: Arc::new(JsonFileStore::<SubscriberState>::new(dir)?),
            channel_words: Arc::new(JsonFileStore::<ChannelWord>::new(dir)?),
            definitions: Arc::new(JsonFileStore::<CachedDefinition>::new(dir)?),
        })
    }

    /// プロセス内だけで保持する（終了時に破棄）
    pub fn memory() -> Self {
        Self {
            subscribers: Arc::new(MemoryStore::<SubscriberState>::new()),
            channel_words: Arc::new(MemoryStore::<ChannelWord>::new()),
            definitions: Arc::new(MemoryStore::<CachedDefinition>::new()),
        }
    }

    /// 設定に応じて選ぶ
    pub fn for_config(config: &AppConfig, ephemeral: bool) -> Result<Self> {
        if ephemeral {
            tracing::warn!("using in-memory stores, nothing will be persisted");
            Ok(Self::memory())
        } else {
            tracing::info!(dir = %config.data_dir.display(), "using JSON file stores");
            Self::json(&config.data_dir)
        }
    }
}

/// サービスコンテナ
pub struct ServiceContainer {
    pub catalog: WordCatalog,
    pub cache: Arc<DefinitionCache>,
    pub subscribers: Arc<SubscriberRotationManager>,
    pub channel: Arc<ChannelRotationManager>,
    pub composer: Arc<MessageComposer>,
    pub orchestrator: Arc<DistributionOrchestrator>,
}

impl ServiceContainer {
    /// 設定から本番用の依存関係を組み立てる
    ///
    /// 語彙ファイルが読めない・空の場合はエラー（起動させない）。
    pub async fn from_config(
        config: &AppConfig,
        stores: Stores,
        transport: Arc<dyn MessageTransport>,
    ) -> Result<Self> {
        let catalog = WordCatalog::from_file(&config.word_file)?;
        let lookup = Arc::new(DictionaryApiClient::new(&config.dictionary_url)?);

        Self::with_dependencies(
            catalog,
            stores,
            lookup,
            transport,
            config.channel_id.clone(),
            config.words_per_day,
        )
        .await
    }

    /// 依存関係を注入して作成（テスト用）
    pub async fn with_dependencies(
        catalog: WordCatalog,
        stores: Stores,
        lookup: Arc<dyn DefinitionLookup>,
        transport: Arc<dyn MessageTransport>,
        channel_id: Option<String>,
        words_per_day: usize,
    ) -> Result<Self> {
        let cache = Arc::new(DefinitionCache::new(lookup, stores.definitions));
        cache.load().await?;

        let subscribers = Arc::new(SubscriberRotationManager::new(
            catalog.clone(),
            stores.subscribers,
        ));
        let channel = Arc::new(ChannelRotationManager::new(
            catalog.clone(),
            stores.channel_words,
        ));
        let composer = Arc::new(MessageComposer::new(cache.clone()));

        let orchestrator = Arc::new(DistributionOrchestrator::new(
            subscribers.clone(),
            channel.clone(),
            composer.clone(),
            transport,
            channel_id,
            words_per_day,
        ));

        Ok(ServiceContainer {
            catalog,
            cache,
            subscribers,
            channel,
            composer,
            orchestrator,
        })
    }
}

/// テスト用のヘルパー実装
pub mod test_helpers {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::application::traits::Destination;
    use crate::domain::Document;
    use crate::domain::definition::{RawEntry, RawMeaning, RawSense};
    use crate::error::VocabError;
    use crate::infrastructure::config::DEFAULT_WORDS_PER_DAY;

    /// テスト用のモック辞書
    ///
    /// 登録されていない単語は「見つからない」（空応答）を返す。
    #[derive(Default)]
    pub struct MockLookup {
        entries: HashMap<String, Vec<RawEntry>>,
        failures: Mutex<HashMap<String, usize>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MockLookup {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_definition(mut self, word: &str, part_of_speech: &str, definition: &str) -> Self {
            let entry = RawEntry {
                word: word.to_string(),
                phonetic: None,
                phonetics: Vec::new(),
                meanings: vec![RawMeaning {
                    part_of_speech: Some(part_of_speech.to_string()),
                    definitions: vec![RawSense {
                        definition: Some(definition.to_string()),
                    }],
                }],
            };
            self.entries.insert(word.to_string(), vec![entry]);
            self
        }

        /// 次の `n` 回の問い合わせを失敗させる
        pub fn fail_next(&self, word: &str, n: usize) {
            if let Ok(mut failures) = self.failures.lock() {
                failures.insert(word.to_string(), n);
            }
        }

        /// 問い合わせ回数
        pub fn calls(&self, word: &str) -> usize {
            self.calls
                .lock()
                .map(|c| c.get(word).copied().unwrap_or(0))
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl DefinitionLookup for MockLookup {
        async fn lookup(&self, word: &str) -> Result<Vec<RawEntry>> {
            if let Ok(mut calls) = self.calls.lock() {
                *calls.entry(word.to_string()).or_insert(0) += 1;
            }
            if let Ok(mut failures) = self.failures.lock() {
                if let Some(remaining) = failures.get_mut(word) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(VocabError::LookupFailed(format!("mock failure for {}", word)));
                    }
                }
            }
            Ok(self.entries.get(word).cloned().unwrap_or_default())
        }
    }

    /// テスト用のモック配信
    #[derive(Default)]
    pub struct MockTransport {
        fail_remaining: AtomicUsize,
        attempted: Mutex<Vec<(Destination, String)>>,
        delivered: Mutex<Vec<(Destination, String)>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// 次の `n` 回の配信を失敗させる
        pub fn fail_next(&self, n: usize) {
            self.fail_remaining.store(n, Ordering::SeqCst);
        }

        /// 配信に成功したメッセージ
        pub fn delivered(&self) -> Vec<(Destination, String)> {
            self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
        }

        /// 失敗したものも含めた配信試行
        pub fn attempted(&self) -> Vec<(Destination, String)> {
            self.attempted.lock().map(|d| d.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl MessageTransport for MockTransport {
        async fn deliver(&self, destination: &Destination, text: &str) -> Result<()> {
            let record = (destination.clone(), text.to_string());
            if let Ok(mut attempted) = self.attempted.lock() {
                attempted.push(record.clone());
            }

            let failed = self
                .fail_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(VocabError::DeliveryFailed(format!("mock failure for {}", destination)));
            }

            if let Ok(mut delivered) = self.delivered.lock() {
                delivered.push(record);
            }
            Ok(())
        }
    }

    /// 読み出しは常に空、書き込みは常に失敗するストア
    pub struct FailingStore;

    #[async_trait]
    impl<D: Document> DocumentStore<D> for FailingStore {
        async fn find_one(&self, _key: &str) -> Result<Option<D>> {
            Ok(None)
        }

        async fn find_all(&self) -> Result<Vec<D>> {
            Ok(Vec::new())
        }

        async fn upsert_many(&self, _docs: Vec<D>) -> Result<()> {
            Err(VocabError::StoreFailed(format!("{}: mock write failure", D::COLLECTION)))
        }

        async fn replace_all(&self, _docs: Vec<D>) -> Result<()> {
            Err(VocabError::StoreFailed(format!("{}: mock write failure", D::COLLECTION)))
        }
    }

    /// 書き込みの成否を途中で切り替えられるオンメモリストア
    pub struct FlakyStore<D: Document> {
        inner: MemoryStore<D>,
        reject_writes: AtomicBool,
    }

    impl<D: Document> Default for FlakyStore<D> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<D: Document> FlakyStore<D> {
        pub fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                reject_writes: AtomicBool::new(false),
            }
        }

        pub fn reject_writes(&self, reject: bool) {
            self.reject_writes.store(reject, Ordering::SeqCst);
        }

        fn check_write(&self) -> Result<()> {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(VocabError::StoreFailed(format!(
                    "{}: mock write failure",
                    D::COLLECTION
                )));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<D: Document> DocumentStore<D> for FlakyStore<D> {
        async fn find_one(&self, key: &str) -> Result<Option<D>> {
            self.inner.find_one(key).await
        }

        async fn find_all(&self) -> Result<Vec<D>> {
            self.inner.find_all().await
        }

        async fn upsert_many(&self, docs: Vec<D>) -> Result<()> {
            self.check_write()?;
            self.inner.upsert_many(docs).await
        }

        async fn replace_all(&self, docs: Vec<D>) -> Result<()> {
            self.check_write()?;
            self.inner.replace_all(docs).await
        }
    }

    /// テスト用のServiceContainerビルダー
    pub struct TestServiceContainerBuilder {
        words: Vec<String>,
        words_per_day: usize,
        lookup: MockLookup,
        transport: Option<Arc<MockTransport>>,
        channel_id: Option<String>,
        stores: Option<Stores>,
    }

    impl TestServiceContainerBuilder {
        pub fn new(words: Vec<&str>) -> Self {
            Self {
                words: words.into_iter().map(str::to_string).collect(),
                words_per_day: DEFAULT_WORDS_PER_DAY,
                lookup: MockLookup::new(),
                transport: None,
                channel_id: Some("@test_channel".to_string()),
                stores: None,
            }
        }

        pub fn with_words_per_day(mut self, n: usize) -> Self {
            self.words_per_day = n;
            self
        }

        pub fn with_lookup(mut self, lookup: MockLookup) -> Self {
            self.lookup = lookup;
            self
        }

        pub fn with_transport(mut self, transport: Arc<MockTransport>) -> Self {
            self.transport = Some(transport);
            self
        }

        pub fn with_stores(mut self, stores: Stores) -> Self {
            self.stores = Some(stores);
            self
        }

        pub fn without_channel(mut self) -> Self {
            self.channel_id = None;
            self
        }

        pub async fn build(self) -> Result<ServiceContainer> {
            let catalog = WordCatalog::new(self.words)?;
            let transport = self
                .transport
                .unwrap_or_else(|| Arc::new(MockTransport::new()));
            ServiceContainer::with_dependencies(
                catalog,
                self.stores.unwrap_or_else(Stores::memory),
                Arc::new(self.lookup),
                transport,
                self.channel_id,
                self.words_per_day,
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;
    use crate::error::VocabError;

    #[tokio::test]
    async fn test_service_container_creation() {
        let container = TestServiceContainerBuilder::new(vec!["apple", "banana"])
            .build()
            .await
            .expect("Failed to create test container");

        assert_eq!(container.catalog.len(), 2);
        assert!(container.cache.is_empty());
        assert_eq!(container.orchestrator.words_per_day(), 10);
    }

    #[tokio::test]
    async fn empty_catalog_is_rejected() {
        let result = TestServiceContainerBuilder::new(vec!["", "  "]).build().await;
        assert!(matches!(result, Err(VocabError::EmptyCatalog)));
    }

    #[tokio::test]
    async fn json_stores_live_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let stores = Stores::json(dir.path()).unwrap();
        let container = TestServiceContainerBuilder::new(vec!["apple"])
            .with_stores(stores)
            .build()
            .await
            .unwrap();

        container.orchestrator.serve_subscriber("1").await.unwrap();
        assert!(dir.path().join("subscribers.json").exists());
    }

    #[tokio::test]
    async fn mock_transport_counts_failures() {
        let transport = MockTransport::new();
        transport.fail_next(1);
        let dest = crate::application::traits::Destination::Subscriber("1".into());
        assert!(transport.deliver(&dest, "a").await.is_err());
        assert!(transport.deliver(&dest, "b").await.is_ok());
        assert_eq!(transport.attempted().len(), 2);
        assert_eq!(transport.delivered(), vec![(dest, "b".to_string())]);
    }
}
