//! 統一エラーハンドリング
//!
//! このモジュールは vocab_bot 全体で使用する統一エラー型を定義します。
//! 外部サービス由来の一時的な失敗と、設定・データ起因の失敗を区別し、
//! 購読者向けの謝罪メッセージもここで決定します。

use thiserror::Error;

/// vocab_bot 全体で使用する統一エラー型
#[derive(Debug, Error)]
pub enum VocabError {
    // ========================================
    // 単語カタログ関連エラー
    // ========================================
    #[error("Word catalog is empty")]
    EmptyCatalog,

    #[error("Word catalog could not be loaded: {0}")]
    CatalogLoad(String),

    #[error("No words available to send")]
    NoWordsAvailable,

    // ========================================
    // 外部サービス関連エラー
    // ========================================
    #[error("Definition lookup failed: {0}")]
    LookupFailed(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Chat API request failed: {0}")]
    ChatApiFailed(String),

    // ========================================
    // 永続化関連エラー
    // ========================================
    #[error("Store operation failed: {0}")]
    StoreFailed(String),

    // ========================================
    // 設定関連エラー
    // ========================================
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("System error: {0}")]
    SystemError(String),
}

/// 統一Result型エイリアス
pub type Result<T> = std::result::Result<T, VocabError>;

// ========================================
// 外部エラー型からの自動変換実装
// ========================================

impl From<std::io::Error> for VocabError {
    fn from(error: std::io::Error) -> Self {
        VocabError::StoreFailed(error.to_string())
    }
}

impl From<serde_json::Error> for VocabError {
    fn from(error: serde_json::Error) -> Self {
        VocabError::StoreFailed(error.to_string())
    }
}

/// String からの変換（文字列エラーとの互換性）
impl From<String> for VocabError {
    fn from(message: String) -> Self {
        VocabError::SystemError(message)
    }
}

/// &str からの変換（便利メソッド）
impl From<&str> for VocabError {
    fn from(message: &str) -> Self {
        VocabError::SystemError(message.to_string())
    }
}

// ========================================
// ヘルパー関数
// ========================================

/// 設定・データ起因の失敗時に購読者へ返す文言
pub const APOLOGY_NO_WORDS: &str =
    "Sorry, the word list could not be loaded. Please contact the administrator.";

/// 一時的な失敗時に購読者へ返す文言
pub const APOLOGY_TEMPORARY: &str =
    "Sorry, there was an error processing your request. Please try again later.";

impl VocabError {
    /// エラーが再試行可能かどうかを判定
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VocabError::LookupFailed(_)
                | VocabError::DeliveryFailed(_)
                | VocabError::ChatApiFailed(_)
                | VocabError::StoreFailed(_)
        )
    }

    /// エラーが管理者の対応で解決可能かどうかを判定
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            VocabError::EmptyCatalog
                | VocabError::CatalogLoad(_)
                | VocabError::NoWordsAvailable
                | VocabError::ConfigMissing(_)
                | VocabError::ConfigInvalid(_)
        )
    }

    /// エラーの重要度レベルを取得
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            VocabError::EmptyCatalog
            | VocabError::CatalogLoad(_)
            | VocabError::ConfigMissing(_)
            | VocabError::ConfigInvalid(_)
            | VocabError::StoreFailed(_) => ErrorSeverity::Error,

            VocabError::DeliveryFailed(_)
            | VocabError::ChatApiFailed(_)
            | VocabError::NoWordsAvailable => ErrorSeverity::Warning,

            VocabError::LookupFailed(_) => ErrorSeverity::Info,

            VocabError::SystemError(_) => ErrorSeverity::Debug,
        }
    }

    /// 重要度に応じたレベルでエラーを記録
    pub fn log(&self, context: &str) {
        let retryable = self.is_retryable();
        match self.severity() {
            ErrorSeverity::Error => tracing::error!(error = %self, retryable, "{}", context),
            ErrorSeverity::Warning => tracing::warn!(error = %self, retryable, "{}", context),
            ErrorSeverity::Info => tracing::info!(error = %self, retryable, "{}", context),
            ErrorSeverity::Debug => tracing::debug!(error = %self, retryable, "{}", context),
        }
    }

    /// 購読者向けの謝罪メッセージ
    ///
    /// 設定やデータの問題と一時的な障害とで文言を分ける。
    pub fn apology(&self) -> &'static str {
        if self.is_user_actionable() {
            APOLOGY_NO_WORDS
        } else {
            APOLOGY_TEMPORARY
        }
    }
}

/// エラーの重要度レベル
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Debug,
    Info,
    Warning,
    Error,
}
