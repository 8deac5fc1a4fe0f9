//! チャットコマンドハンドラー
//!
//! # 責任
//! - 受信メッセージからコマンドを判別して適切なサービスへ委譲
//! - 処理中ステータスの表示と後始末
//! - 失敗時の謝罪メッセージ

use std::sync::Arc;

use crate::application::orchestrator::DistributionOrchestrator;
use crate::application::traits::ChatControl;
use crate::error::Result;
use crate::infrastructure::external::telegram::Update;

/// `/words` 受付時に表示するステータス
pub const PROCESSING_STATUS: &str = "Processing your request. Preparing vocabulary words...";

pub const USAGE: &str = "Hi! I send vocabulary words with short definitions.\n\n\
/words - get your next batch of words\n\
/help - show this message\n\n\
A new set of words is also posted to the channel every day.";

/// 対応しているコマンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Words,
    Start,
    Help,
}

impl BotCommand {
    /// メッセージ本文からコマンドを判別（`/words@botname` 形式も受け付ける）
    pub fn parse(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        let name = name.split_once('@').map(|(n, _)| n).unwrap_or(name);
        match name {
            "words" => Some(Self::Words),
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// コマンドハンドラー
pub struct CommandHandler {
    orchestrator: Arc<DistributionOrchestrator>,
    chat: Arc<dyn ChatControl>,
}

impl CommandHandler {
    pub fn new(orchestrator: Arc<DistributionOrchestrator>, chat: Arc<dyn ChatControl>) -> Self {
        Self { orchestrator, chat }
    }

    /// 受信した更新を 1 件処理
    ///
    /// コマンド以外のメッセージは無視する。
    pub async fn handle_update(&self, update: Update) -> Result<()> {
        let Some(message) = update.message else {
            return Ok(());
        };
        let Some(command) = message.text.as_deref().and_then(BotCommand::parse) else {
            return Ok(());
        };
        let chat_id = message.chat.id.to_string();
        tracing::info!(chat = %chat_id, ?command, "received command");

        match command {
            BotCommand::Words => self.handle_words(&chat_id).await,
            BotCommand::Start | BotCommand::Help => {
                self.chat.send_status(&chat_id, USAGE).await?;
                Ok(())
            }
        }
    }

    async fn handle_words(&self, chat_id: &str) -> Result<()> {
        let status_id = self.chat.send_status(chat_id, PROCESSING_STATUS).await?;

        match self.orchestrator.serve_subscriber(chat_id).await {
            Ok(_) => {
                if let Err(e) = self.chat.delete_status(chat_id, status_id).await {
                    tracing::warn!(chat = chat_id, error = %e, "failed to delete status message");
                }
                Ok(())
            }
            Err(e) => {
                e.log(&format!("/words failed for chat {}", chat_id));
                let apology = e.apology();
                if let Err(edit_err) = self.chat.edit_status(chat_id, status_id, apology).await {
                    tracing::warn!(chat = chat_id, error = %edit_err, "failed to edit status, sending new message");
                    self.chat.send_status(chat_id, apology).await?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::service_container::test_helpers::{
        MockTransport, TestServiceContainerBuilder,
    };
    use crate::error::{APOLOGY_TEMPORARY, VocabError};
    use crate::infrastructure::external::telegram::{Chat, IncomingMessage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ChatEvent {
        Sent(String),
        Edited(i64, String),
        Deleted(i64),
    }

    #[derive(Default)]
    struct MockChat {
        events: Mutex<Vec<ChatEvent>>,
        fail_edit: bool,
    }

    impl MockChat {
        fn events(&self) -> Vec<ChatEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatControl for MockChat {
        async fn send_status(&self, _chat_id: &str, text: &str) -> Result<i64> {
            let mut events = self.events.lock().unwrap();
            events.push(ChatEvent::Sent(text.to_string()));
            Ok(events.len() as i64)
        }

        async fn edit_status(&self, _chat_id: &str, message_id: i64, text: &str) -> Result<()> {
            if self.fail_edit {
                return Err(VocabError::ChatApiFailed("edit".into()));
            }
            self.events
                .lock()
                .unwrap()
                .push(ChatEvent::Edited(message_id, text.to_string()));
            Ok(())
        }

        async fn delete_status(&self, _chat_id: &str, message_id: i64) -> Result<()> {
            self.events.lock().unwrap().push(ChatEvent::Deleted(message_id));
            Ok(())
        }
    }

    fn update(text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(IncomingMessage {
                message_id: 9,
                chat: Chat { id: 42 },
                text: Some(text.to_string()),
            }),
        }
    }

    async fn handler(transport: Arc<MockTransport>, chat: Arc<MockChat>) -> CommandHandler {
        let container = TestServiceContainerBuilder::new(vec!["apple", "banana", "cherry"])
            .with_words_per_day(2)
            .with_transport(transport)
            .build()
            .await
            .unwrap();
        CommandHandler::new(container.orchestrator, chat)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(BotCommand::parse("/words"), Some(BotCommand::Words));
        assert_eq!(BotCommand::parse("/words@vocab_bot"), Some(BotCommand::Words));
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse("/help extra"), Some(BotCommand::Help));
        assert_eq!(BotCommand::parse("words"), None);
        assert_eq!(BotCommand::parse("/wordsmith"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[tokio::test]
    async fn words_sends_and_deletes_status() {
        let transport = Arc::new(MockTransport::new());
        let chat = Arc::new(MockChat::default());
        let handler = handler(transport.clone(), chat.clone()).await;

        handler.handle_update(update("/words")).await.unwrap();

        assert_eq!(
            chat.events(),
            vec![
                ChatEvent::Sent(PROCESSING_STATUS.to_string()),
                ChatEvent::Deleted(1)
            ]
        );
        let delivered = transport.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0.chat_id(), "42");
    }

    #[tokio::test]
    async fn failed_delivery_edits_status_to_apology() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next(1);
        let chat = Arc::new(MockChat::default());
        let handler = handler(transport, chat.clone()).await;

        handler.handle_update(update("/words")).await.unwrap();

        assert_eq!(
            chat.events().last(),
            Some(&ChatEvent::Edited(1, APOLOGY_TEMPORARY.to_string()))
        );
    }

    #[tokio::test]
    async fn failed_edit_falls_back_to_new_message() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_next(1);
        let chat = Arc::new(MockChat {
            fail_edit: true,
            ..Default::default()
        });
        let handler = handler(transport, chat.clone()).await;

        handler.handle_update(update("/words")).await.unwrap();

        assert_eq!(
            chat.events(),
            vec![
                ChatEvent::Sent(PROCESSING_STATUS.to_string()),
                ChatEvent::Sent(APOLOGY_TEMPORARY.to_string())
            ]
        );
    }

    #[tokio::test]
    async fn help_replies_with_usage_and_plain_text_is_ignored() {
        let transport = Arc::new(MockTransport::new());
        let chat = Arc::new(MockChat::default());
        let handler = handler(transport.clone(), chat.clone()).await;

        handler.handle_update(update("hello")).await.unwrap();
        assert!(chat.events().is_empty());

        handler.handle_update(update("/help")).await.unwrap();
        assert_eq!(chat.events(), vec![ChatEvent::Sent(USAGE.to_string())]);
        assert!(transport.delivered().is_empty());
    }
}
