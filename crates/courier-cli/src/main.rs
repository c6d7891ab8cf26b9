mod backends;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use courier_core::Config;
use courier_core::app::DaemonBuilder;
use courier_core::impls::TokioProcessRunner;

#[tokio::main]
async fn main() -> ExitCode {
    // (A) 設定を読む（ログ初期化前なので stderr に直接出す）
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("courier: {e}");
            return ExitCode::FAILURE;
        }
    };

    // LOGLEVEL の既定値 (error) でも見えるように stderr へ
    eprintln!("{}", startup_report(&config));
    telemetry::init(config.log_level);

    // (B) backend を開く
    let backends = match backends::open(&config.backend, &config.queue_name).await {
        Ok(backends) => backends,
        Err(e) => {
            tracing::error!(error = %e, "failed to open storage backend");
            return ExitCode::FAILURE;
        }
    };

    // (C) デーモンを組み立てて worker を起動
    let daemon = match DaemonBuilder::from_config(&config)
        .queue(backends.queue)
        .blobs(backends.blobs)
        .runner(Arc::new(TokioProcessRunner::new()))
        .build()
    {
        Ok(daemon) => daemon,
        Err(e) => {
            tracing::error!(error = %e, "failed to build daemon");
            return ExitCode::FAILURE;
        }
    };
    let workers = daemon.spawn();
    tracing::info!(workers = workers.len(), "workers started");

    // (D) シグナルを待って graceful shutdown（処理中の 1 件は最後まで終わらせる）
    wait_for_signal().await;
    tracing::info!("shutdown requested; finishing in-flight items");
    workers.shutdown_and_join().await;
    tracing::info!("courier stopped");

    ExitCode::SUCCESS
}

/// Effective configuration plus any ignored values, one line each.
fn startup_report(config: &Config) -> String {
    let mut lines: Vec<String> = config
        .warnings
        .iter()
        .map(|w| format!("courier: ignored {w}"))
        .collect();
    lines.push(format!("courier: starting with {config}"));
    lines.join("\n")
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::error!(error = %e, "cannot install SIGTERM handler; only Ctrl-C will stop");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
            }
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "cannot listen for Ctrl-C");
            }
        }
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
    }
}
