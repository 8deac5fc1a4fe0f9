//! ドキュメント永続化 I/F – ドメイン層
//!
//! コレクションごとに一意キーを持つレコードを保存する。
//! 各メソッドは 1 回の不可分な書き込みとして扱われる。

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

/// 永続化されるレコード
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// コレクション名（ファイル名などに使われる）
    const COLLECTION: &'static str;

    /// コレクション内で一意なキー
    fn key(&self) -> &str;
}

/// ドキュメント永続化 I/F
#[async_trait]
pub trait DocumentStore<D: Document>: Send + Sync {
    /// キーで 1 件取得
    async fn find_one(&self, key: &str) -> Result<Option<D>>;

    /// 全件取得
    async fn find_all(&self) -> Result<Vec<D>>;

    /// 追加 or 置換（後勝ち）
    async fn upsert(&self, doc: D) -> Result<()> {
        self.upsert_many(vec![doc]).await
    }

    /// 複数件をまとめて追加 or 置換
    async fn upsert_many(&self, docs: Vec<D>) -> Result<()>;

    /// コレクションの内容を丸ごと置き換える
    async fn replace_all(&self, docs: Vec<D>) -> Result<()>;
}

/// `upsert_many` の共通処理：キーが一致すれば置換、無ければ末尾に追加
pub fn merge_by_key<D: Document>(list: &mut Vec<D>, docs: Vec<D>) {
    for doc in docs {
        if let Some(existing) = list.iter_mut().find(|e| e.key() == doc.key()) {
            *existing = doc;
        } else {
            list.push(doc);
        }
    }
}

/// `replace_all` の共通処理：キー重複は後勝ちで 1 件に畳む
pub fn dedup_by_key<D: Document>(docs: Vec<D>) -> Vec<D> {
    let mut out = Vec::with_capacity(docs.len());
    merge_by_key(&mut out, docs);
    out
}
