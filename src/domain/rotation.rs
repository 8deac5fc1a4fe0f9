//! 購読者ごとの出題順序（順列 + カーソル） – ドメイン層
//!
//! 順列はカタログの全インデックスを 1 回ずつ含む。カーソルは次に送る位置。
//! 1 周するまで同じ単語は出ない。

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::WordCatalog;
use crate::domain::slice::Slice;
use crate::domain::store::Document;

/// `0..len` を一様にシャッフルした順列
pub fn shuffled_indices<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(rng);
    indices
}

/// 購読者の出題状態（永続化レコード）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberState {
    pub subscriber_id: String,
    pub permutation: Vec<usize>,
    pub cursor: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriberState {
    /// 新しい購読者の状態を作成（カーソル 0）
    pub fn new<R: Rng + ?Sized>(subscriber_id: &str, catalog_len: usize, rng: &mut R) -> Self {
        let now = Utc::now();
        Self {
            subscriber_id: subscriber_id.to_string(),
            permutation: shuffled_indices(catalog_len, rng),
            cursor: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 現在のカタログに対して状態が有効か
    ///
    /// 長さの一致に加え、カーソルの範囲と各インデックスの一意性も確認する。
    pub fn is_valid_for(&self, catalog_len: usize) -> bool {
        if self.permutation.len() != catalog_len || self.cursor >= self.permutation.len() {
            return false;
        }
        let mut seen = vec![false; catalog_len];
        self.permutation.iter().all(|&i| i < catalog_len && !std::mem::replace(&mut seen[i], true))
    }

    /// 順列を作り直してカーソルを 0 に戻す
    pub fn regenerate<R: Rng + ?Sized>(&mut self, catalog_len: usize, rng: &mut R) {
        self.permutation = shuffled_indices(catalog_len, rng);
        self.cursor = 0;
        self.updated_at = Utc::now();
    }

    /// カーソル位置から `size` 語を選ぶ
    ///
    /// 末尾を越えたら先頭に回り込む。カタログより多くは選ばない。
    /// 範囲外のインデックスは読み飛ばす。
    pub fn slice(&self, catalog: &WordCatalog, size: usize) -> Slice {
        let len = self.permutation.len();
        if len == 0 {
            return Slice::new(Vec::new(), size);
        }
        let words = (0..size.min(len))
            .map(|offset| self.permutation[(self.cursor + offset) % len])
            .filter_map(|index| catalog.get(index))
            .map(str::to_string)
            .collect();
        Slice::new(words, size)
    }

    /// 配信後の次のカーソル位置
    pub fn next_cursor(&self, size: usize) -> usize {
        match self.permutation.len() {
            0 => 0,
            len => (self.cursor + size) % len,
        }
    }

    /// 今の周回で何語目まで進んだか（表示用）
    pub fn progress(&self) -> (usize, usize) {
        (self.cursor, self.permutation.len())
    }
}

impl Document for SubscriberState {
    const COLLECTION: &'static str = "subscribers";

    fn key(&self) -> &str {
        &self.subscriber_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn catalog() -> WordCatalog {
        WordCatalog::new(["apple", "banana", "cherry", "date", "elder"]).unwrap()
    }

    #[test]
    fn shuffled_indices_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut perm = shuffled_indices(50, &mut rng);
        perm.sort_unstable();
        assert_eq!(perm, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn fresh_state_is_valid() {
        let mut rng = StdRng::seed_from_u64(1);
        let state = SubscriberState::new("42", 5, &mut rng);
        assert!(state.is_valid_for(5));
        assert!(!state.is_valid_for(4));
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn duplicate_or_out_of_range_indices_are_invalid() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = SubscriberState::new("42", 3, &mut rng);
        state.permutation = vec![0, 0, 1];
        assert!(!state.is_valid_for(3));
        state.permutation = vec![0, 1, 3];
        assert!(!state.is_valid_for(3));
        state.permutation = vec![2, 1, 0];
        state.cursor = 3;
        assert!(!state.is_valid_for(3));
    }

    #[test]
    fn consecutive_slices_do_not_overlap_within_cycle() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = SubscriberState::new("42", catalog.len(), &mut rng);

        let first = state.slice(&catalog, 2);
        assert_eq!(first.len(), 2);
        state.cursor = state.next_cursor(2);
        assert_eq!(state.cursor, 2);

        let second = state.slice(&catalog, 2);
        state.cursor = state.next_cursor(2);
        assert_eq!(state.cursor, 4);

        let a: HashSet<_> = first.words.iter().collect();
        assert!(second.words.iter().all(|w| !a.contains(w)));
    }

    #[test]
    fn slice_wraps_around_cycle_boundary() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(9);
        let mut state = SubscriberState::new("42", catalog.len(), &mut rng);
        state.cursor = 4;

        let slice = state.slice(&catalog, 2);
        let tail = catalog.get(state.permutation[4]).unwrap();
        let head = catalog.get(state.permutation[0]).unwrap();
        assert_eq!(slice.words, vec![tail.to_string(), head.to_string()]);
        assert_eq!(state.next_cursor(2), 1);
    }

    #[test]
    fn slice_larger_than_catalog_is_partial() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(11);
        let state = SubscriberState::new("42", catalog.len(), &mut rng);

        let slice = state.slice(&catalog, 10);
        assert!(slice.is_partial());
        assert_eq!(slice.len(), 5);
        let distinct: HashSet<_> = slice.words.iter().collect();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn out_of_bounds_indices_are_skipped() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(5);
        let mut state = SubscriberState::new("42", catalog.len(), &mut rng);
        state.permutation = vec![0, 1, 2, 3, 99];
        state.cursor = 3;

        let slice = state.slice(&catalog, 2);
        assert_eq!(slice.words, vec!["date".to_string()]);
    }

    #[test]
    fn full_span_covers_catalog_without_excess_repeats() {
        let catalog = WordCatalog::new((0..23).map(|i| format!("w{i}"))).unwrap();
        let k = 4;
        let calls = catalog.len().div_ceil(k);
        let mut rng = StdRng::seed_from_u64(21);
        let mut state = SubscriberState::new("42", catalog.len(), &mut rng);

        let mut counts = std::collections::HashMap::new();
        for _ in 0..calls {
            for w in state.slice(&catalog, k).words {
                *counts.entry(w).or_insert(0usize) += 1;
            }
            state.cursor = state.next_cursor(k);
        }

        assert_eq!(counts.len(), catalog.len());
        assert!(counts.values().all(|&c| c <= calls));
    }
}
