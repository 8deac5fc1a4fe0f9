//! 配信の統括
//!
//! # 責任
//! - 購読者への即時配信（`serve_subscriber`）
//! - チャンネルへの日次配信（`serve_channel`）
//!
//! どちらも 状態参照 → 配信分選択 → 定義付与 → 整形 → 配信 → 状態更新 の順。
//! 状態更新は配信が確定した場合だけ行う。配信の再試行はしない。
//! 配信後の状態更新に失敗しても、届いた単語は成功として報告する。

use std::sync::Arc;

use chrono::Local;

use crate::application::channel_rotation::ChannelRotationManager;
use crate::application::composer::{MessageComposer, RenderTier, channel_header, subscriber_header};
use crate::application::subscriber_rotation::SubscriberRotationManager;
use crate::application::traits::{Destination, MessageTransport};
use crate::error::{Result, VocabError};
use crate::utils::profiling;

/// 購読者への配信結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberDelivery {
    pub words: Vec<String>,
    pub partial: bool,
    pub tier: RenderTier,
    pub next_cursor: usize,
    /// 新しいカーソルを保存できたか
    pub committed: bool,
}

/// チャンネルへの配信結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDelivery {
    pub words: Vec<String>,
    pub was_reset: bool,
    pub tier: RenderTier,
    /// 配信履歴を保存できたか
    pub committed: bool,
}

pub struct DistributionOrchestrator {
    subscribers: Arc<SubscriberRotationManager>,
    channel: Arc<ChannelRotationManager>,
    composer: Arc<MessageComposer>,
    transport: Arc<dyn MessageTransport>,
    channel_id: Option<String>,
    words_per_day: usize,
}

impl DistributionOrchestrator {
    pub fn new(
        subscribers: Arc<SubscriberRotationManager>,
        channel: Arc<ChannelRotationManager>,
        composer: Arc<MessageComposer>,
        transport: Arc<dyn MessageTransport>,
        channel_id: Option<String>,
        words_per_day: usize,
    ) -> Self {
        Self {
            subscribers,
            channel,
            composer,
            transport,
            channel_id,
            words_per_day,
        }
    }

    pub fn words_per_day(&self) -> usize {
        self.words_per_day
    }

    /// 購読者に次の配信分を送る
    ///
    /// 配信に失敗した場合はカーソルを進めないので、再要求で同じ単語が届く。
    pub async fn serve_subscriber(&self, subscriber_id: &str) -> Result<SubscriberDelivery> {
        let timer = profiling::Timer::start("serve.subscriber");
        let pending = self
            .subscribers
            .prepare(subscriber_id, self.words_per_day)
            .await?;
        if pending.slice.is_empty() {
            tracing::warn!(subscriber = subscriber_id, "no valid words to send");
            return Err(VocabError::NoWordsAvailable);
        }

        let rendered = self
            .composer
            .render(&pending.slice, &subscriber_header())
            .await;
        let destination = Destination::Subscriber(subscriber_id.to_string());
        if let Err(e) = self.transport.deliver(&destination, &rendered.text).await {
            tracing::error!(subscriber = subscriber_id, error = %e, "delivery failed, cursor not advanced");
            return Err(e);
        }

        let words = pending.slice.words.clone();
        let partial = pending.slice.is_partial();
        let cursor = pending.cursor;
        let (next_cursor, committed) = match self.subscribers.commit(pending).await {
            Ok(next_cursor) => (next_cursor, true),
            Err(e) => {
                e.log("words delivered but cursor was not saved");
                (cursor, false)
            }
        };
        tracing::info!(
            subscriber = subscriber_id,
            count = words.len(),
            next_cursor,
            committed,
            tier = ?rendered.tier,
            "sent words to subscriber"
        );
        timer.log_with(&format!("count={}", words.len()));

        Ok(SubscriberDelivery {
            words,
            partial,
            tier: rendered.tier,
            next_cursor,
            committed,
        })
    }

    /// チャンネルに本日の配信分を送る（日次ジョブから呼ばれる）
    ///
    /// 配信に失敗した場合は履歴を更新しない。
    pub async fn serve_channel(&self) -> Result<ChannelDelivery> {
        let timer = profiling::Timer::start("serve.channel");
        let channel_id = self
            .channel_id
            .clone()
            .ok_or_else(|| VocabError::ConfigMissing("CHANNEL_ID".into()))?;

        let pending = self.channel.prepare(self.words_per_day).await?;
        let selected = pending.selected.clone();
        if selected.slice.is_empty() {
            tracing::warn!("no valid words to send to channel");
            return Err(VocabError::NoWordsAvailable);
        }

        let header = channel_header(Local::now().date_naive());
        let rendered = self.composer.render(&selected.slice, &header).await;
        let destination = Destination::Channel(channel_id);
        if let Err(e) = self.transport.deliver(&destination, &rendered.text).await {
            tracing::error!(error = %e, "channel delivery failed, history not updated");
            return Err(e);
        }

        let committed = match self.channel.commit(pending).await {
            Ok(()) => true,
            Err(e) => {
                e.log("channel words delivered but history was not saved");
                false
            }
        };
        tracing::info!(
            count = selected.slice.len(),
            was_reset = selected.was_reset,
            committed,
            tier = ?rendered.tier,
            "sent words to channel"
        );
        timer.log_with(&format!("count={}", selected.slice.len()));

        Ok(ChannelDelivery {
            words: selected.slice.words,
            was_reset: selected.was_reset,
            tier: rendered.tier,
            committed,
        })
    }
}
