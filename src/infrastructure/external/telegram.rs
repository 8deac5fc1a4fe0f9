//! Telegram Bot API クライアント
//! MessageTransport / ChatControl トレイトを実装し、更新のロングポーリングも提供する

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::application::traits::{ChatControl, Destination, MessageTransport};
use crate::error::{Result, VocabError};
use crate::infrastructure::config::DEFAULT_POLL_TIMEOUT_SECS;
use crate::utils::profiling;

pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";

/// クライアント全体の上限。既定のロングポーリング待ちより長くする
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(DEFAULT_POLL_TIMEOUT_SECS + 30);

/// Bot API 共通レスポンス
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramClient {
    client: reqwest::Client,
    base: String,
    token: String,
}

impl TelegramClient {
    pub fn new(base: &str, token: &str) -> Result<Self> {
        Self::with_timeout(base, token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// `getUpdates` は呼び出しごとに待ち時間 + 10 秒の上限で上書きする
    pub fn with_timeout(base: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VocabError::SystemError(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.client.post(self.method_url(method)).json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // トークンを含む URL はエラーに出さない
        let response = request
            .send()
            .await
            .map_err(|e| VocabError::ChatApiFailed(format!("{}: {}", method, e.without_url())))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| VocabError::ChatApiFailed(format!("{}: {}", method, e.without_url())))?;

        let parsed: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            VocabError::ChatApiFailed(format!("{}: status {}: {}", method, status, e))
        })?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(VocabError::ChatApiFailed(format!(
                "{}: status {}: {}",
                method,
                status,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    /// 新着更新をロングポーリングで取得
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
            Some(Duration::from_secs(timeout_secs + 10)),
        )
        .await
    }

    async fn send_message(&self, chat_id: &str, text: &str, markdown: bool) -> Result<i64> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if markdown {
            body["parse_mode"] = json!("Markdown");
        }
        let sent: SentMessage = self.call("sendMessage", body, None).await?;
        Ok(sent.message_id)
    }
}

#[async_trait]
impl MessageTransport for TelegramClient {
    async fn deliver(&self, destination: &Destination, text: &str) -> Result<()> {
        let timer = profiling::Timer::start("telegram.deliver");
        self.send_message(destination.chat_id(), text, true)
            .await
            .map_err(|e| VocabError::DeliveryFailed(format!("{}: {}", destination, e)))?;
        timer.log();
        Ok(())
    }
}

#[async_trait]
impl ChatControl for TelegramClient {
    async fn send_status(&self, chat_id: &str, text: &str) -> Result<i64> {
        self.send_message(chat_id, text, false).await
    }

    async fn edit_status(&self, chat_id: &str, message_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn delete_status(&self, chat_id: &str, message_id: i64) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                json!({ "chat_id": chat_id, "message_id": message_id }),
                None,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_url_joins_token_and_method() {
        let client = TelegramClient::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn stalled_delivery_fails_after_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client =
            TelegramClient::with_timeout(&base, "123:abc", Duration::from_millis(200)).unwrap();
        let destination = Destination::Channel("@words".into());
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.deliver(&destination, "hello"),
        )
        .await
        .expect("delivery should give up on its own");
        assert!(matches!(result, Err(VocabError::DeliveryFailed(_))));
    }

    #[test]
    fn update_parses_text_message() {
        let update: Update = serde_json::from_str(
            r#"{"update_id": 10, "message": {"message_id": 5, "chat": {"id": -100, "type": "private"}, "text": "/words"}}"#,
        )
        .unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.text.as_deref(), Some("/words"));
    }

    #[test]
    fn error_response_carries_description() {
        let parsed: ApiResponse<bool> =
            serde_json::from_str(r#"{"ok": false, "error_code": 400, "description": "Bad Request"}"#)
                .unwrap();
        assert!(!parsed.ok);
        assert!(parsed.result.is_none());
        assert_eq!(parsed.description.as_deref(), Some("Bad Request"));
    }
}
