//! 単語定義エンティティと外部辞書レスポンスの正規化 – ドメイン層

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::store::Document;

/// 品詞と語義の組
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meaning {
    pub part_of_speech: String,
    pub definition: String,
}

/// 正規化済みの単語定義
///
/// `meanings` は最初の語義のみ（最大 1 件）を保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub word: String,
    #[serde(default)]
    pub phonetic: String,
    #[serde(default)]
    pub meanings: Vec<Meaning>,
}

impl Definition {
    /// 外部辞書のレスポンスを正規化します。
    ///
    /// 最初のエントリから発音記号と最初の語義だけを取り出します。
    /// エントリが無い場合は `None`。
    pub fn from_raw(entries: &[RawEntry]) -> Option<Self> {
        let entry = entries.first()?;
        if entry.word.trim().is_empty() {
            return None;
        }

        let phonetic = entry
            .phonetic
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| {
                entry
                    .phonetics
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .find(|t| !t.is_empty())
            })
            .unwrap_or_default()
            .to_string();

        let meanings = entry
            .meanings
            .iter()
            .take(1)
            .map(|m| Meaning {
                part_of_speech: m.part_of_speech.clone().unwrap_or_default(),
                definition: m
                    .definitions
                    .first()
                    .and_then(|d| d.definition.clone())
                    .unwrap_or_default(),
            })
            .collect();

        Some(Self {
            word: entry.word.clone(),
            phonetic,
            meanings,
        })
    }

    /// 表示に使う最初の語義
    pub fn first_meaning(&self) -> Option<&Meaning> {
        self.meanings.first()
    }
}

/// 外部辞書 API の 1 エントリ（必要なフィールドのみ）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub phonetic: Option<String>,
    #[serde(default)]
    pub phonetics: Vec<RawPhonetic>,
    #[serde(default)]
    pub meanings: Vec<RawMeaning>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPhonetic {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeaning {
    #[serde(default)]
    pub part_of_speech: Option<String>,
    #[serde(default)]
    pub definitions: Vec<RawSense>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSense {
    #[serde(default)]
    pub definition: Option<String>,
}

/// 定義キャッシュの永続化レコード
///
/// 一度書かれたら更新しない。キーは問い合わせた単語そのもの。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDefinition {
    pub word: String,
    pub definition: Definition,
    pub fetched_at: DateTime<Utc>,
}

impl CachedDefinition {
    pub fn new(word: &str, definition: Definition) -> Self {
        Self {
            word: word.to_string(),
            definition,
            fetched_at: Utc::now(),
        }
    }
}

impl Document for CachedDefinition {
    const COLLECTION: &'static str = "word_details_cache";

    fn key(&self) -> &str {
        &self.word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<RawEntry> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn keeps_only_first_sense() {
        let raw = parse(
            r#"[{
                "word": "apple",
                "phonetic": "/ˈæp.əl/",
                "meanings": [
                    {"partOfSpeech": "noun", "definitions": [
                        {"definition": "A common, round fruit."},
                        {"definition": "The tree bearing it."}
                    ]},
                    {"partOfSpeech": "verb", "definitions": [{"definition": "To apple."}]}
                ]
            }]"#,
        );

        let def = Definition::from_raw(&raw).unwrap();
        assert_eq!(def.word, "apple");
        assert_eq!(def.phonetic, "/ˈæp.əl/");
        assert_eq!(
            def.meanings,
            vec![Meaning {
                part_of_speech: "noun".into(),
                definition: "A common, round fruit.".into(),
            }]
        );
    }

    #[test]
    fn phonetic_falls_back_to_phonetics_list() {
        let raw = parse(
            r#"[{"word": "cherry", "phonetics": [{"audio": "x.mp3"}, {"text": "/ˈtʃɛɹi/"}], "meanings": []}]"#,
        );
        let def = Definition::from_raw(&raw).unwrap();
        assert_eq!(def.phonetic, "/ˈtʃɛɹi/");
        assert!(def.first_meaning().is_none());
    }

    #[test]
    fn missing_phonetic_is_empty_string() {
        let raw = parse(r#"[{"word": "date"}]"#);
        assert_eq!(Definition::from_raw(&raw).unwrap().phonetic, "");
    }

    #[test]
    fn empty_response_is_none() {
        assert!(Definition::from_raw(&[]).is_none());
        assert!(Definition::from_raw(&[RawEntry::default()]).is_none());
    }
}
