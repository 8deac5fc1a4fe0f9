//! 単語カタログ – ドメイン層
//!
//! 起動時に一度だけ読み込まれ、プロセス終了まで変更されない語彙リスト。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, VocabError};

/// 重複のない単語の順序付きリスト
///
/// 複製は `Arc` の参照カウント増加のみ。
#[derive(Debug, Clone)]
pub struct WordCatalog {
    words: Arc<[String]>,
}

impl WordCatalog {
    /// 単語列からカタログを作成します。
    ///
    /// 前後の空白を取り除き、空行と重複（最初の出現を残す）を捨てます。
    /// 結果が空の場合は `EmptyCatalog` を返します。
    pub fn new<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .filter(|w| seen.insert(w.clone()))
            .collect();

        if words.is_empty() {
            return Err(VocabError::EmptyCatalog);
        }
        Ok(Self {
            words: words.into(),
        })
    }

    /// 1 行 1 単語のテキストを解析します。
    pub fn parse(content: &str) -> Result<Self> {
        Self::new(content.lines())
    }

    /// 単語ファイルを読み込みます。
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VocabError::CatalogLoad(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::parse(&content)?;
        tracing::info!(count = catalog.len(), path = %path.display(), "loaded word catalog");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// 不変条件により常に false だが、`len` と対で提供する。
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// 先頭 `len` 語だけを残したカタログ（語彙ファイル差し替えの再現用）
    pub fn truncated(&self, len: usize) -> Result<Self> {
        Self::new(self.words.iter().take(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_skips_blank_lines() {
        let catalog = WordCatalog::parse("apple\n  banana \n\n\tcherry\n").unwrap();
        assert_eq!(catalog.words(), &["apple", "banana", "cherry"]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let catalog = WordCatalog::new(["date", "apple", "date", "elder"]).unwrap();
        assert_eq!(catalog.words(), &["date", "apple", "elder"]);
        assert_eq!(catalog.get(2), Some("elder"));
        assert_eq!(catalog.get(3), None);
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(matches!(
            WordCatalog::parse("\n   \n"),
            Err(VocabError::EmptyCatalog)
        ));
    }

    #[test]
    fn missing_file_reports_catalog_load() {
        let result = WordCatalog::from_file(Path::new("/definitely/not/here/words.txt"));
        assert!(matches!(result, Err(VocabError::CatalogLoad(_))));
    }

    #[test]
    fn truncated_keeps_prefix() {
        let catalog = WordCatalog::new(["a", "b", "c", "d"]).unwrap();
        let smaller = catalog.truncated(2).unwrap();
        assert_eq!(smaller.words(), &["a", "b"]);
        assert!(catalog.contains("d"));
        assert!(!smaller.contains("d"));
    }
}
