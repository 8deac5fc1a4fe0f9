//! Application層の抽象化トレイト定義
//! 外部依存を抽象化し、テスト可能な構造を提供します

use std::fmt;

use async_trait::async_trait;

use crate::domain::definition::RawEntry;
use crate::error::Result;

/// 配信先
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// 個別の購読者（チャット ID）
    Subscriber(String),
    /// 共有チャンネル
    Channel(String),
}

impl Destination {
    /// チャット API に渡す宛先 ID
    pub fn chat_id(&self) -> &str {
        match self {
            Destination::Subscriber(id) | Destination::Channel(id) => id,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Subscriber(id) => write!(f, "subscriber {}", id),
            Destination::Channel(id) => write!(f, "channel {}", id),
        }
    }
}

/// 外部辞書の抽象化
#[async_trait]
pub trait DefinitionLookup: Send + Sync {
    /// 単語の生の定義ドキュメントを取得（見つからなければ空）
    async fn lookup(&self, word: &str) -> Result<Vec<RawEntry>>;
}

/// メッセージ配信の抽象化
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// 整形済みメッセージを配信。`Ok` は配信確定を意味する
    async fn deliver(&self, destination: &Destination, text: &str) -> Result<()>;
}

/// チャット上のステータス表示の抽象化
#[async_trait]
pub trait ChatControl: Send + Sync {
    /// プレーンテキストを送信し、メッセージ ID を返す
    async fn send_status(&self, chat_id: &str, text: &str) -> Result<i64>;

    /// 既存メッセージを書き換える
    async fn edit_status(&self, chat_id: &str, message_id: i64, text: &str) -> Result<()>;

    /// 既存メッセージを削除する
    async fn delete_status(&self, chat_id: &str, message_id: i64) -> Result<()>;
}
