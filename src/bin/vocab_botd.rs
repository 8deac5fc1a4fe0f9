//! vocab_botd: 単語配信ボットの常駐プロセス
//!
//! # 概要
//! - Bot API をロングポーリングし、`/words` などのコマンドに応答
//! - 毎日決まった時刻にチャンネルへ単語を配信
//!
//! ## 実行モデル
//! - 受信した更新は 1 件ずつタスク化（`TaskTracker` で追跡）
//! - SIGINT / SIGTERM で `CancellationToken` をキャンセルし、
//!   ポーリングと日次ジョブを止めてから実行中タスクの完了を待つ

use std::{error::Error, sync::Arc, time::Duration};

use tokio_util::{sync::CancellationToken, task::TaskTracker};
use vocab_bot::{
    application::{CommandHandler, DailySchedule, ServiceContainer, Stores, run_daily},
    infrastructure::{config::AppConfig, external::TelegramClient},
    utils::{init_tracing, load_env},
};

/// ポーリング失敗後の待ち時間
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let env_file = load_env();
    init_tracing();
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    if let Err(e) = async_main().await {
        tracing::error!(error = %e, "vocab_botd exited with error");
        return Err(e);
    }
    Ok(())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let schedule = DailySchedule::new(config.send_time.0, config.send_time.1)?;
    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_url,
        config.require_bot_token()?,
    )?);
    if let Err(e) = config.require_channel_id() {
        tracing::warn!(error = %e, "daily channel job will fail until CHANNEL_ID is set");
    }

    // 語彙が読めなければ起動しない
    let stores = Stores::for_config(&config, false)?;
    let container = ServiceContainer::from_config(&config, stores, telegram.clone()).await?;
    let handler = Arc::new(CommandHandler::new(
        container.orchestrator.clone(),
        telegram.clone(),
    ));

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    tracker.spawn(run_daily(
        schedule,
        container.orchestrator.clone(),
        shutdown.clone(),
    ));
    tracker.spawn(wait_for_signal(shutdown.clone()));

    tracing::info!(
        words = container.catalog.len(),
        cached_definitions = container.cache.len(),
        "vocab_botd started"
    );
    poll_updates(&telegram, handler, &tracker, &shutdown, config.poll_timeout_secs).await;

    tracker.close();
    tracker.wait().await;
    tracing::info!("vocab_botd stopped");
    Ok(())
}

/// キャンセルされるまで更新を取得し、1 件ごとにハンドラを起動する
async fn poll_updates(
    telegram: &TelegramClient,
    handler: Arc<CommandHandler>,
    tracker: &TaskTracker,
    shutdown: &CancellationToken,
    timeout_secs: u64,
) {
    let mut offset = 0i64;
    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => return,
            result = telegram.get_updates(offset, timeout_secs) => result,
        };

        let updates = match result {
            Ok(updates) => updates,
            Err(e) => {
                e.log("failed to fetch updates, retrying");
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let handler = handler.clone();
            tracker.spawn(async move {
                if let Err(e) = handler.handle_update(update).await {
                    e.log("failed to handle update");
                }
            });
        }
    }
}

/// SIGINT / SIGTERM を待ってトークンをキャンセルする
async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                    _ = shutdown.cancelled() => return,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGTERM handler");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = shutdown.cancelled() => return,
                }
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = shutdown.cancelled() => return,
        }
    }

    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
