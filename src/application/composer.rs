//! 配信メッセージの組み立て
//!
//! # 責任
//! - 単語ごとに定義キャッシュを引いて整形（定義が無い語はリンクのみ）
//! - 要求語数に満たない場合の注記
//! - 定義取得で異常があった場合は全語リンクのみの最小形式に落とす
//!
//! Telegram の旧 Markdown（`parse_mode=Markdown`）向けの文字列を返す。

use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use url::Url;

use crate::application::definition_cache::DefinitionCache;
use crate::domain::definition::Definition;
use crate::domain::slice::Slice;

/// この文字数を超える定義は切り詰める
pub const MAX_DEFINITION_CHARS: usize = 80;
/// 切り詰め時に残す文字数（末尾に "..." を付ける）
pub const TRUNCATED_DEFINITION_CHARS: usize = 77;

const DICTIONARY_BASE: &str = "https://dictionary.cambridge.org/dictionary/english/";
const LINK_FOOTER: &str = "_Click on the 📖 icon to see more details in Cambridge Dictionary._";

/// どの形式で組み立てたか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTier {
    /// 定義付き
    Enriched,
    /// 単語 + リンクのみ
    Minimal,
}

/// 組み立て済みメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub tier: RenderTier,
}

/// 購読者向けヘッダー
pub fn subscriber_header() -> String {
    "📚 *Your Vocabulary Words* 📚".to_string()
}

/// チャンネル向けヘッダー（例: `Monday, January 6, 2025`）
pub fn channel_header(date: NaiveDate) -> String {
    format!("📚 *Daily Vocabulary - {}* 📚", date.format("%A, %B %-d, %Y"))
}

/// 旧 Markdown のエンティティ外で意味を持つ文字をエスケープ
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// 80 文字を超える定義を 77 文字 + "..." に切り詰める（文字数基準）
pub fn truncate_definition(definition: &str) -> String {
    if definition.chars().count() > MAX_DEFINITION_CHARS {
        let head: String = definition
            .chars()
            .take(TRUNCATED_DEFINITION_CHARS)
            .collect();
        format!("{}...", head)
    } else {
        definition.to_string()
    }
}

/// 辞書サイトへのリンク
pub fn dictionary_link(word: &str) -> String {
    match Url::parse(DICTIONARY_BASE) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(word);
            }
            url.to_string()
        }
        Err(_) => format!("{}{}", DICTIONARY_BASE, word),
    }
}

/// 単語 + リンクだけの 1 行
pub fn format_minimal(word: &str) -> String {
    format!("• *{}* [📖]({})", word, dictionary_link(word))
}

/// 定義付きの 1 エントリ。定義が無ければ最小形式
pub fn format_entry(word: &str, definition: Option<&Definition>) -> String {
    let Some(definition) = definition else {
        return format_minimal(word);
    };

    let mut entry = format!("• *{}*", word);
    if !definition.phonetic.is_empty() {
        entry.push(' ');
        entry.push_str(&escape_markdown(&definition.phonetic));
    }
    entry.push('\n');

    if let Some(meaning) = definition.first_meaning() {
        if !meaning.part_of_speech.is_empty() {
            entry.push_str(&format!(" (_{}_)", meaning.part_of_speech));
        }
        if !meaning.definition.is_empty() {
            entry.push_str(": ");
            entry.push_str(&escape_markdown(&truncate_definition(&meaning.definition)));
        }
    }

    entry.push_str(&format!(" [📖]({})", dictionary_link(word)));
    entry
}

fn partial_note(delivered: usize) -> String {
    format!(
        "_(Note: Only {} words sent due to list size or errors.)_",
        delivered
    )
}

pub struct MessageComposer {
    cache: Arc<DefinitionCache>,
}

impl MessageComposer {
    pub fn new(cache: Arc<DefinitionCache>) -> Self {
        Self { cache }
    }

    /// 配信分をメッセージに組み立てる
    ///
    /// 定義取得に異常があれば最小形式に落とすので、単語が 1 つでもあれば
    /// 必ず何かしらの本文を返す。
    pub async fn render(&self, slice: &Slice, header: &str) -> Rendered {
        let lookups = join_all(slice.words.iter().map(|w| self.cache.get(w))).await;

        let mut definitions = Vec::with_capacity(lookups.len());
        for (word, result) in slice.words.iter().zip(lookups) {
            match result {
                Ok(definition) => definitions.push(definition),
                Err(e) => {
                    tracing::warn!(word = %word, error = %e, "enrichment failed, using minimal format");
                    return self.render_minimal(slice, header);
                }
            }
        }

        let mut text = format!("{}\n\n", header);
        for (word, definition) in slice.words.iter().zip(&definitions) {
            text.push_str(&format_entry(word, definition.as_ref()));
            text.push_str("\n\n");
        }
        text.push_str(LINK_FOOTER);
        if slice.is_partial() {
            text.push_str("\n\n");
            text.push_str(&partial_note(slice.len()));
        }

        Rendered {
            text,
            tier: RenderTier::Enriched,
        }
    }

    /// 単語 + リンクのみの最小形式
    pub fn render_minimal(&self, slice: &Slice, header: &str) -> Rendered {
        let mut text = format!("{}\n\n", header);
        for word in &slice.words {
            text.push_str(&format_minimal(word));
            text.push('\n');
        }
        if slice.is_partial() {
            text.push_str("\n\n");
            text.push_str(&partial_note(slice.len()));
        }

        Rendered {
            text,
            tier: RenderTier::Minimal,
        }
    }
}
