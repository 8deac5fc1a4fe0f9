//! チャンネル配信履歴と次の配信分の選択 – ドメイン層
//!
//! 履歴に無い単語から選び、全語を送り切ったら全カタログから選び直す（リセット）。
//! リセット時は今回の単語だけが新しい履歴になる。

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::WordCatalog;
use crate::domain::slice::Slice;
use crate::domain::store::Document;

/// チャンネルへ送信済みの単語（永続化レコード）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelWord {
    pub word: String,
    pub sent_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

impl ChannelWord {
    pub fn sent_today(word: &str) -> Self {
        Self {
            word: word.to_string(),
            sent_date: Local::now().date_naive(),
            updated_at: Utc::now(),
        }
    }
}

impl Document for ChannelWord {
    const COLLECTION: &'static str = "channel_words";

    fn key(&self) -> &str {
        &self.word
    }
}

/// チャンネル向けに選ばれた配信分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSlice {
    pub slice: Slice,
    /// 全語送信済みだったため履歴をリセットした
    pub was_reset: bool,
}

/// 送信済み単語の集合
#[derive(Debug, Clone, Default)]
pub struct BroadcastHistory {
    words: HashSet<String>,
}

impl BroadcastHistory {
    pub fn new<I: IntoIterator<Item = String>>(words: I) -> Self {
        Self {
            words: words.into_iter().collect(),
        }
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// カタログのうち未送信の単語（カタログ順）
    pub fn available<'a>(&self, catalog: &'a WordCatalog) -> Vec<&'a str> {
        catalog
            .words()
            .iter()
            .map(String::as_str)
            .filter(|w| !self.words.contains(*w))
            .collect()
    }

    /// カタログのうち送信済みの語数
    pub fn coverage(&self, catalog: &WordCatalog) -> usize {
        catalog.len() - self.available(catalog).len()
    }

    /// 次の配信分を選ぶ
    ///
    /// 未送信語が無ければ全カタログをシャッフルしてリセット扱いにする。
    pub fn select<R: Rng + ?Sized>(
        &self,
        catalog: &WordCatalog,
        size: usize,
        rng: &mut R,
    ) -> ChannelSlice {
        let available = self.available(catalog);
        let (mut pool, was_reset): (Vec<&str>, bool) = if available.is_empty() {
            (catalog.words().iter().map(String::as_str).collect(), true)
        } else {
            (available, false)
        };

        pool.shuffle(rng);
        pool.truncate(size);
        ChannelSlice {
            slice: Slice::new(pool.into_iter().map(str::to_string).collect(), size),
            was_reset,
        }
    }

    /// 配信確定後の履歴を適用する
    pub fn record(&mut self, selected: &ChannelSlice) {
        if selected.was_reset {
            self.words.clear();
        }
        self.words.extend(selected.slice.words.iter().cloned());
    }
}
