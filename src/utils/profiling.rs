//! 外部呼び出しと配信処理の所要時間計測
//!
//! `VOCAB_BOT_PROFILE=1` のときは全計測を `profile` ターゲットに出す。
//! 閾値を超えた計測は設定に関係なく警告として出す。

use std::sync::OnceLock;
use std::time::{Duration, Instant};

const PROFILE_ENV: &str = "VOCAB_BOT_PROFILE";

/// これより遅い計測は常に警告する
pub const SLOW_THRESHOLD: Duration = Duration::from_secs(5);

/// プロファイルログが有効かを返す（初回に環境変数を読む）
pub fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(PROFILE_ENV)
            .ok()
            .map(|value| value.trim().to_ascii_lowercase())
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false)
    })
}

/// 計測結果の出し分け
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    Silent,
    Profile,
    Slow,
}

pub fn classify(elapsed: Duration, profiling: bool) -> Report {
    if elapsed >= SLOW_THRESHOLD {
        Report::Slow
    } else if profiling {
        Report::Profile
    } else {
        Report::Silent
    }
}

pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// 計測を終えて結果を出す
    pub fn log(self) -> Report {
        self.log_with("")
    }

    /// 追加情報付きで計測を終える
    pub fn log_with(self, extra: &str) -> Report {
        let elapsed = self.elapsed();
        let report = classify(elapsed, enabled());
        let ms = elapsed.as_millis() as u64;
        match report {
            Report::Silent => {}
            Report::Profile => {
                tracing::info!(target: "profile", label = self.label, ms, extra, "PROFILE")
            }
            Report::Slow => {
                tracing::warn!(target: "profile", label = self.label, ms, extra, "slow operation")
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_calls_are_reported_even_without_profiling() {
        assert_eq!(classify(Duration::from_secs(6), false), Report::Slow);
        assert_eq!(classify(SLOW_THRESHOLD, true), Report::Slow);
    }

    #[test]
    fn fast_calls_follow_profile_switch() {
        let fast = Duration::from_millis(20);
        assert_eq!(classify(fast, false), Report::Silent);
        assert_eq!(classify(fast, true), Report::Profile);
    }

    #[test]
    fn timer_measures_elapsed_time() {
        let timer = Timer::start("test.timer");
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(5));
        assert_ne!(timer.log(), Report::Slow);
    }
}
