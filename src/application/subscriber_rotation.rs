//! 購読者ごとの出題状態を管理するサービス
//!
//! # 責任
//! - 初回要求時の順列生成と永続化
//! - カタログと食い違う状態の自己修復（順列再生成 + カーソル 0）
//! - 配信分の選択と、配信確定後のカーソル前進
//!
//! 同じ購読者の read-modify-write は購読者単位のロックで直列化する。
//! ロックは `prepare` から `commit`（または破棄）まで保持される。
//! 誰も保持していないロックは次の取得時か `commit` 後に捨てる。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use crate::domain::catalog::WordCatalog;
use crate::domain::rotation::SubscriberState;
use crate::domain::slice::Slice;
use crate::domain::store::DocumentStore;
use crate::error::{Result, VocabError};

/// 配信待ちの購読者向け配信分
///
/// 配信に失敗したら `commit` せずに破棄すれば状態は進まない。
pub struct PendingSubscriberSlice {
    pub slice: Slice,
    /// 今回の開始位置
    pub cursor: usize,
    /// 配信確定後のカーソル
    pub next_cursor: usize,
    state: SubscriberState,
    _guard: OwnedMutexGuard<()>,
}

pub struct SubscriberRotationManager {
    catalog: WordCatalog,
    store: Arc<dyn DocumentStore<SubscriberState>>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SubscriberRotationManager {
    pub fn new(catalog: WordCatalog, store: Arc<dyn DocumentStore<SubscriberState>>) -> Self {
        Self {
            catalog,
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &WordCatalog {
        &self.catalog
    }

    fn lock_for(&self, subscriber_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| VocabError::SystemError(format!("Lock error: {}", e)))?;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks
            .entry(subscriber_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    fn prune_locks(&self) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    /// 永続化済みの状態を参照（作成・修復はしない）
    pub async fn find(&self, subscriber_id: &str) -> Result<Option<SubscriberState>> {
        self.store.find_one(subscriber_id).await
    }

    /// 次の配信分を選ぶ
    ///
    /// 未登録なら状態を作成し、不正なら作り直して永続化する。
    /// カーソルはここでは進めない。
    pub async fn prepare(&self, subscriber_id: &str, size: usize) -> Result<PendingSubscriberSlice> {
        let guard = self.lock_for(subscriber_id)?.lock_owned().await;
        let len = self.catalog.len();

        let state = match self.store.find_one(subscriber_id).await? {
            None => {
                let state = SubscriberState::new(subscriber_id, len, &mut rand::thread_rng());
                self.store.upsert(state.clone()).await?;
                tracing::info!(subscriber = subscriber_id, "registered new subscriber");
                state
            }
            Some(mut state) if !state.is_valid_for(len) => {
                tracing::warn!(
                    subscriber = subscriber_id,
                    permutation_len = state.permutation.len(),
                    catalog_len = len,
                    "rotation state does not match catalog, regenerating"
                );
                state.regenerate(len, &mut rand::thread_rng());
                self.store.upsert(state.clone()).await?;
                state
            }
            Some(state) => state,
        };

        let slice = state.slice(&self.catalog, size);
        let next_cursor = state.next_cursor(size);
        Ok(PendingSubscriberSlice {
            slice,
            cursor: state.cursor,
            next_cursor,
            state,
            _guard: guard,
        })
    }

    /// 配信確定後にカーソルを進めて永続化し、新しいカーソルを返す
    pub async fn commit(&self, pending: PendingSubscriberSlice) -> Result<usize> {
        let PendingSubscriberSlice {
            next_cursor,
            mut state,
            _guard: guard,
            ..
        } = pending;
        state.cursor = next_cursor;
        state.updated_at = Utc::now();
        let saved = self.store.upsert(state).await;
        drop(guard);
        self.prune_locks();
        saved?;
        Ok(next_cursor)
    }
}
