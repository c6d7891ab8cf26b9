//! ログ初期化
//!
//! `RUST_LOG` があればそれを優先し、なければ LOGLEVEL から決めたレベルを使う。

use courier_core::LogLevel;
use tracing_subscriber::EnvFilter;

pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
