//! 1 回の配信で送る単語の組

/// 1 回の配信分の単語
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// 送信順の単語
    pub words: Vec<String>,
    /// 要求された語数
    pub requested: usize,
}

impl Slice {
    pub fn new(words: Vec<String>, requested: usize) -> Self {
        Self { words, requested }
    }

    /// 要求より少ない語数しか選べなかった
    pub fn is_partial(&self) -> bool {
        self.words.len() < self.requested
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_when_shorter_than_requested() {
        let slice = Slice::new(vec!["a".into(), "b".into()], 3);
        assert!(slice.is_partial());
        assert_eq!(slice.len(), 2);

        let full = Slice::new(vec!["a".into()], 1);
        assert!(!full.is_partial());
    }
}
