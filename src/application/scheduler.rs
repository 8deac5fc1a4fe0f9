//! 日次ジョブのスケジューラ
//!
//! 毎日決まったローカル時刻にチャンネル配信を 1 回実行する。
//! 実行結果はログに残すだけで、失敗しても再試行はしない（翌日また選び直す）。

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, TimeZone};
use tokio_util::sync::CancellationToken;

use crate::application::orchestrator::DistributionOrchestrator;
use crate::error::{Result, VocabError};

/// 1 日 1 回の実行時刻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            VocabError::ConfigInvalid(format!("send time {:02}:{:02}", hour, minute))
        })?;
        Ok(Self { time })
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// `now` より後の直近の実行時刻（壁時計ベース）
    pub fn next_after_naive(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.time);
        if today > now {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }

    /// `now` より後の直近の実行時刻
    ///
    /// 夏時間の切り替えで存在しない時刻は 1 時間後ろへずらす。
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let mut candidate = self.next_after_naive(now.naive_local());
        loop {
            if let Some(at) = tz.from_local_datetime(&candidate).earliest() {
                if at > *now {
                    return at;
                }
                candidate = self.next_after_naive(candidate);
            } else {
                candidate += ChronoDuration::hours(1);
            }
        }
    }

    /// 次回実行までの待ち時間
    pub fn until_next(&self, now: &DateTime<Local>) -> std::time::Duration {
        (self.next_after(now) - now.clone())
            .to_std()
            .unwrap_or_default()
    }
}

/// キャンセルされるまで毎日チャンネル配信を実行する
pub async fn run_daily(
    schedule: DailySchedule,
    orchestrator: Arc<DistributionOrchestrator>,
    shutdown: CancellationToken,
) {
    tracing::info!(time = %schedule.time().format("%H:%M"), "daily channel job scheduled (local time)");
    loop {
        let wait = schedule.until_next(&Local::now());
        tracing::debug!(secs = wait.as_secs(), "waiting for next channel job");

        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("daily channel job stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        tracing::info!("running daily channel job");
        match orchestrator.serve_channel().await {
            Ok(delivery) => tracing::info!(
                count = delivery.words.len(),
                was_reset = delivery.was_reset,
                "daily channel job finished"
            ),
            Err(e) => e.log("daily channel job failed"),
        }
    }
}
