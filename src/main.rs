//! vocab_bot CLI: 配信の手動実行と状態確認用の運用コマンド。
//! デーモン（`vocab_botd`）と同じストアを直接読み書きします。
use std::sync::Arc;

use clap::{Parser, Subcommand};
use vocab_bot::{
    application::{
        ChannelRotationManager, DefinitionCache, ServiceContainer, Stores,
        SubscriberRotationManager, composer::format_entry,
    },
    domain::WordCatalog,
    infrastructure::{
        config::AppConfig,
        external::{DictionaryApiClient, TelegramClient},
    },
    utils::{init_tracing, load_env},
};

#[derive(Parser)]
#[command(author, version, about = "Vocabulary bot operator commands")]
struct Cli {
    /// 永続化せずメモリ上のストアを使う
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// チャンネルへ本日の単語を今すぐ送る
    SendChannel,
    /// 購読者へ次の単語を今すぐ送る
    SendWords {
        #[arg(long)]
        chat_id: String,
    },
    /// カタログ・キャッシュ・配信履歴の状態を表示
    Status {
        #[arg(long)]
        chat_id: Option<String>,
    },
    /// 単語の定義を引いて整形結果を表示
    Lookup { word: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_file = load_env();
    init_tracing();
    if let Some(path) = env_file {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let stores = Stores::for_config(&config, cli.ephemeral)?;

    match cli.cmd {
        Cmd::SendChannel => {
            let container = build_container(&config, stores).await?;
            let delivery = container.orchestrator.serve_channel().await?;
            println!(
                "Sent {} words to channel{}",
                delivery.words.len(),
                if delivery.was_reset { " (new cycle)" } else { "" }
            );
            if !delivery.committed {
                eprintln!("Warning: channel history was not saved");
            }
            for word in &delivery.words {
                println!("  {}", word);
            }
        }
        Cmd::SendWords { chat_id } => {
            let container = build_container(&config, stores).await?;
            let delivery = container.orchestrator.serve_subscriber(&chat_id).await?;
            println!(
                "Sent {} words to {} (next cursor {}{})",
                delivery.words.len(),
                chat_id,
                delivery.next_cursor,
                if delivery.committed { "" } else { ", not saved" }
            );
            for word in &delivery.words {
                println!("  {}", word);
            }
        }
        Cmd::Status { chat_id } => print_status(&config, stores, chat_id.as_deref()).await?,
        Cmd::Lookup { word } => {
            let cache = load_cache(&config, &stores).await?;
            let definition = cache.get(&word).await?;
            if definition.is_none() {
                eprintln!("No definition found for {:?}", word);
            }
            println!("{}", format_entry(&word, definition.as_ref()));
        }
    }

    Ok(())
}

async fn build_container(
    config: &AppConfig,
    stores: Stores,
) -> Result<ServiceContainer, Box<dyn std::error::Error>> {
    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_url,
        config.require_bot_token()?,
    )?);
    Ok(ServiceContainer::from_config(config, stores, telegram).await?)
}

async fn load_cache(
    config: &AppConfig,
    stores: &Stores,
) -> Result<DefinitionCache, Box<dyn std::error::Error>> {
    let lookup = Arc::new(DictionaryApiClient::new(&config.dictionary_url)?);
    let cache = DefinitionCache::new(lookup, stores.definitions.clone());
    cache.load().await?;
    Ok(cache)
}

async fn print_status(
    config: &AppConfig,
    stores: Stores,
    chat_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = WordCatalog::from_file(&config.word_file)?;
    let cache = load_cache(config, &stores).await?;
    let channel = ChannelRotationManager::new(catalog.clone(), stores.channel_words.clone());
    let coverage = channel.coverage().await?;

    println!("catalog:      {} words ({})", catalog.len(), config.word_file.display());
    println!("definitions:  {} cached", cache.len());
    println!("channel:      {}/{} sent this cycle", coverage.sent, coverage.total);
    println!(
        "schedule:     {:02}:{:02} local, {} words per send",
        config.send_time.0, config.send_time.1, config.words_per_day
    );

    if let Some(chat_id) = chat_id {
        let subscribers = SubscriberRotationManager::new(catalog.clone(), stores.subscribers);
        match subscribers.find(chat_id).await? {
            Some(state) if state.is_valid_for(catalog.len()) => {
                let (done, total) = state.progress();
                println!("subscriber:   {} at {}/{} of current cycle", chat_id, done, total);
            }
            Some(_) => println!("subscriber:   {} (state will be regenerated on next request)", chat_id),
            None => println!("subscriber:   {} not registered", chat_id),
        }
    }

    Ok(())
}
