//! tracing の初期化

use tracing_subscriber::EnvFilter;

/// `RUST_LOG`（未設定なら `info`）でフィルタする fmt サブスクライバを登録する。
///
/// 二重登録はエラーにせず無視する。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
