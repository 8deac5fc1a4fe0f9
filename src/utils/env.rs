//! `.env` の読み込み

use std::path::PathBuf;

const ENV_PATH_VAR: &str = "VOCAB_BOT_ENV_PATH";

/// `VOCAB_BOT_ENV_PATH` の指すファイル、無ければカレントの `.env` を読み込む。
///
/// 読み込んだファイルのパスを返す。見つからない・読めない場合は `None`。
/// `RUST_LOG` も `.env` から取れるように、ログ初期化より前に呼ぶ。
pub fn load_env() -> Option<PathBuf> {
    match std::env::var(ENV_PATH_VAR) {
        Ok(path) => {
            let path = PathBuf::from(path);
            dotenvy::from_path(&path).ok().map(|_| path)
        }
        Err(_) => dotenvy::dotenv().ok(),
    }
}
