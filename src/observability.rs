use std::sync::OnceLock;

use anyhow::{Error, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Tracing サブスクライバを一度だけ初期化する。
///
/// 全ての診断ログは stderr に書き出す。stdout はサマリーレポートの
/// JSON 出力専用で、呼び出し元（Node サーバー）がそのままパースする。
///
/// # Errors
/// サブスクライバの初期化に失敗した場合はエラーを返す。
pub fn init() -> Result<()> {
    if TRACING_INIT.set(()).is_err() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| Error::msg(e.to_string()))?;

    Ok(())
}
