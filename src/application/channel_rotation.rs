//! チャンネル配信履歴を管理するサービス
//!
//! # 責任
//! - 未送信語からの配信分選択と、全語送信済み時のリセット判定
//! - 配信確定後の履歴追記（リセット時は今回の単語だけで置き換え）
//!
//! 選択から履歴更新までは 1 本のグローバルロックで直列化する。

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::catalog::WordCatalog;
use crate::domain::channel::{BroadcastHistory, ChannelSlice, ChannelWord};
use crate::domain::store::DocumentStore;
use crate::error::Result;

/// 配信待ちのチャンネル向け配信分
pub struct PendingChannelSlice {
    pub selected: ChannelSlice,
    /// 選択時点の履歴（ロック中なので commit まで変わらない）
    history: BroadcastHistory,
    _guard: OwnedMutexGuard<()>,
}

/// 履歴の概要（状態表示用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCoverage {
    pub sent: usize,
    pub total: usize,
}

pub struct ChannelRotationManager {
    catalog: WordCatalog,
    store: Arc<dyn DocumentStore<ChannelWord>>,
    lock: Arc<Mutex<()>>,
}

impl ChannelRotationManager {
    pub fn new(catalog: WordCatalog, store: Arc<dyn DocumentStore<ChannelWord>>) -> Self {
        Self {
            catalog,
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn history(&self) -> Result<BroadcastHistory> {
        let words = self.store.find_all().await?.into_iter().map(|w| w.word);
        Ok(BroadcastHistory::new(words))
    }

    /// 現在の周回で送信済みの語数
    pub async fn coverage(&self) -> Result<ChannelCoverage> {
        let history = self.history().await?;
        Ok(ChannelCoverage {
            sent: history.coverage(&self.catalog),
            total: self.catalog.len(),
        })
    }

    /// 次の配信分を選ぶ。履歴はここでは変更しない
    pub async fn prepare(&self, size: usize) -> Result<PendingChannelSlice> {
        let guard = self.lock.clone().lock_owned().await;
        let history = self.history().await?;
        tracing::debug!(sent = history.len(), "loaded channel history");

        let selected = history.select(&self.catalog, size, &mut rand::thread_rng());
        if selected.was_reset {
            tracing::info!("all words have been sent to the channel, starting a new cycle");
        }
        Ok(PendingChannelSlice {
            selected,
            history,
            _guard: guard,
        })
    }

    /// 配信確定後に履歴を更新する
    ///
    /// リセット時は置き換え、それ以外は追記。どちらも 1 回の書き込み。
    pub async fn commit(&self, pending: PendingChannelSlice) -> Result<()> {
        let PendingChannelSlice {
            selected,
            mut history,
            _guard,
        } = pending;
        let docs: Vec<ChannelWord> = selected
            .slice
            .words
            .iter()
            .map(|w| ChannelWord::sent_today(w))
            .collect();
        let count = docs.len();

        if selected.was_reset {
            self.store.replace_all(docs).await?;
        } else {
            self.store.upsert_many(docs).await?;
        }
        history.record(&selected);
        tracing::info!(
            count,
            was_reset = selected.was_reset,
            sent = history.coverage(&self.catalog),
            total = self.catalog.len(),
            "recorded channel words"
        );
        Ok(())
    }
}
