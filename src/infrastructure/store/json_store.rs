//! JSON ファイル版 DocumentStore 実装
//!
//! コレクションごとに `<data_dir>/<collection>.json` を 1 ファイル持つ。
//! 書き込みは一時ファイルに書いてから rename するので、途中で落ちても
//! 古い内容か新しい内容のどちらかが残る。
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::store::{Document, DocumentStore, dedup_by_key, merge_by_key};
use crate::error::{Result, VocabError};

pub struct JsonFileStore<D: Document> {
    path: PathBuf,
    /// read-modify-write の直列化用
    write_lock: Mutex<()>,
    _doc: PhantomData<fn() -> D>,
}

impl<D: Document> JsonFileStore<D> {
    /// `dir` 配下にコレクションファイルを置くストアを作成
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            VocabError::StoreFailed(format!("create data dir {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            path: dir.join(format!("{}.json", D::COLLECTION)),
            write_lock: Mutex::new(()),
            _doc: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<D>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let raw: Vec<serde_json::Value> = serde_json::from_slice(&bytes)?;

        // 壊れたレコードは捨てて残りを使う
        let docs = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<D>(value) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!(collection = D::COLLECTION, error = %e, "skipping malformed record");
                    None
                }
            })
            .collect();
        Ok(docs)
    }

    async fn save(&self, all: &[D]) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(all)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl<D: Document> DocumentStore<D> for JsonFileStore<D> {
    async fn find_one(&self, key: &str) -> Result<Option<D>> {
        Ok(self.load().await?.into_iter().find(|d| d.key() == key))
    }

    async fn find_all(&self) -> Result<Vec<D>> {
        self.load().await
    }

    async fn upsert_many(&self, docs: Vec<D>) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let mut list = self.load().await?;
        merge_by_key(&mut list, docs);
        self.save(&list).await
    }

    async fn replace_all(&self, docs: Vec<D>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.save(&dedup_by_key(docs)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rotation::SubscriberState;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    fn state(id: &str, cursor: usize) -> SubscriberState {
        let mut rng = StdRng::seed_from_u64(1);
        let mut s = SubscriberState::new(id, 4, &mut rng);
        s.cursor = cursor;
        s
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::<SubscriberState>::new(dir.path()).unwrap();
        assert!(store.find_all().await.unwrap().is_empty());
        assert!(store.find_one("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_overwrites_by_key_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = JsonFileStore::<SubscriberState>::new(dir.path()).unwrap();
            store.upsert(state("1", 0)).await.unwrap();
            store.upsert(state("2", 1)).await.unwrap();
            store.upsert(state("1", 3)).await.unwrap();
        }

        let reopened = JsonFileStore::<SubscriberState>::new(dir.path()).unwrap();
        let all = reopened.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(reopened.find_one("1").await.unwrap().unwrap().cursor, 3);
        assert!(reopened.path().ends_with("subscribers.json"));
    }

    #[tokio::test]
    async fn replace_all_discards_previous_records() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::<SubscriberState>::new(dir.path()).unwrap();
        store
            .upsert_many(vec![state("1", 0), state("2", 0)])
            .await
            .unwrap();
        store.replace_all(vec![state("3", 2)]).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].subscriber_id, "3");
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::<SubscriberState>::new(dir.path()).unwrap();
        store.upsert(state("1", 2)).await.unwrap();

        let mut raw: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        raw.push(serde_json::json!({ "subscriber_id": "broken" }));
        std::fs::write(store.path(), serde_json::to_vec(&raw).unwrap()).unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].subscriber_id, "1");
    }
}
