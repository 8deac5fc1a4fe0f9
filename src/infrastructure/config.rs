//! 環境変数から組み立てる型付き設定
//!
//! 起動時に一度だけ `AppConfig::from_env()` で構築し、各サービスへ渡す。

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::{Result, VocabError};
use crate::infrastructure::external::dictionary_api::DEFAULT_DICTIONARY_URL;
use crate::infrastructure::external::telegram::DEFAULT_TELEGRAM_URL;

pub const DEFAULT_WORDS_PER_DAY: usize = 10;
pub const DEFAULT_SEND_TIME: (u32, u32) = (8, 0);
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bot API トークン
    pub bot_token: Option<String>,
    /// 日次配信先チャンネル
    pub channel_id: Option<String>,
    /// 1 行 1 単語の語彙ファイル
    pub word_file: PathBuf,
    /// 永続化ファイルの置き場所
    pub data_dir: PathBuf,
    /// 日次配信の時刻（ローカル時刻の時, 分）
    pub send_time: (u32, u32),
    pub words_per_day: usize,
    pub dictionary_url: String,
    pub telegram_url: String,
    pub poll_timeout_secs: u64,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `HH:MM` を (時, 分) に変換
pub fn parse_send_time(value: &str) -> Result<(u32, u32)> {
    let invalid = || VocabError::ConfigInvalid(format!("send time {:?} (expected HH:MM)", value));
    let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

fn default_data_dir() -> Result<PathBuf> {
    if let Some(xdg_data_home) = env_var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg_data_home).join("vocab_bot"));
    }
    let proj = ProjectDirs::from("com", "user", "vocab_bot")
        .ok_or_else(|| VocabError::ConfigMissing("cannot resolve platform data dir".into()))?;
    Ok(proj.data_local_dir().to_path_buf())
}

impl AppConfig {
    /// 環境変数から設定を構築
    pub fn from_env() -> Result<Self> {
        let data_dir = match env_var("VOCAB_BOT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let send_time = env_var("VOCAB_BOT_SEND_TIME")
            .map(|v| parse_send_time(&v))
            .transpose()?
            .unwrap_or(DEFAULT_SEND_TIME);

        let words_per_day = match env_var("VOCAB_BOT_WORDS_PER_DAY") {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(VocabError::ConfigInvalid(format!(
                        "VOCAB_BOT_WORDS_PER_DAY={} (expected a positive integer)",
                        v
                    )));
                }
            },
            None => DEFAULT_WORDS_PER_DAY,
        };

        let poll_timeout_secs = match env_var("VOCAB_BOT_POLL_TIMEOUT_SECS") {
            Some(v) => v.parse().map_err(|_| {
                VocabError::ConfigInvalid(format!("VOCAB_BOT_POLL_TIMEOUT_SECS={}", v))
            })?,
            None => DEFAULT_POLL_TIMEOUT_SECS,
        };

        Ok(Self {
            bot_token: env_var("BOT_TOKEN"),
            channel_id: env_var("CHANNEL_ID"),
            word_file: env_var("VOCAB_BOT_WORD_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("words.txt")),
            data_dir,
            send_time,
            words_per_day,
            dictionary_url: env_var("VOCAB_BOT_DICTIONARY_URL")
                .unwrap_or_else(|| DEFAULT_DICTIONARY_URL.to_string()),
            telegram_url: env_var("VOCAB_BOT_TELEGRAM_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_URL.to_string()),
            poll_timeout_secs,
        })
    }

    /// チャット操作に必須のトークン
    pub fn require_bot_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| VocabError::ConfigMissing("BOT_TOKEN".into()))
    }

    /// 日次配信に必須のチャンネル ID
    pub fn require_channel_id(&self) -> Result<&str> {
        self.channel_id
            .as_deref()
            .ok_or_else(|| VocabError::ConfigMissing("CHANNEL_ID".into()))
    }
}
