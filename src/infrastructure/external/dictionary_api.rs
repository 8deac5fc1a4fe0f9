//! dictionaryapi.dev クライアント
//! Application層の DefinitionLookup トレイトを実装

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::application::traits::DefinitionLookup;
use crate::domain::definition::RawEntry;
use crate::error::{Result, VocabError};
use crate::utils::profiling;

pub const DEFAULT_DICTIONARY_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en/";

/// 1 回の問い合わせに許す時間（購読者ロックを握ったまま待つため短め）
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// 無料辞書 API のクライアント
pub struct DictionaryApiClient {
    client: reqwest::Client,
    base: Url,
}

impl DictionaryApiClient {
    /// `base` は末尾 `/` 付きのエントリ URL
    pub fn new(base: &str) -> Result<Self> {
        Self::with_timeout(base, DEFAULT_LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(base: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base)
            .map_err(|e| VocabError::ConfigInvalid(format!("dictionary url {}: {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(VocabError::ConfigInvalid(format!(
                "dictionary url {} cannot be a base",
                base
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VocabError::SystemError(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, base })
    }

    /// 単語を 1 パスセグメントとしてエンコードした URL
    pub fn entry_url(&self, word: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(word);
        }
        url
    }
}

#[async_trait]
impl DefinitionLookup for DictionaryApiClient {
    async fn lookup(&self, word: &str) -> Result<Vec<RawEntry>> {
        let timer = profiling::Timer::start("dictionary.lookup");
        let response = self
            .client
            .get(self.entry_url(word))
            .send()
            .await
            .map_err(|e| VocabError::LookupFailed(format!("{}: {}", word, e)))?;

        let status = response.status();
        // 未登録語は 404 で返る
        if status == StatusCode::NOT_FOUND {
            timer.log_with("status=404");
            return Ok(vec![]);
        }

        let body = response
            .text()
            .await
            .map_err(|e| VocabError::LookupFailed(format!("{}: {}", word, e)))?;

        if !status.is_success() {
            return Err(VocabError::LookupFailed(format!(
                "{}: status {}: {}",
                word, status, body
            )));
        }

        let entries: Vec<RawEntry> = serde_json::from_str(&body)
            .map_err(|e| VocabError::LookupFailed(format!("{}: malformed response: {}", word, e)))?;
        timer.log();
        Ok(entries)
    }
}
