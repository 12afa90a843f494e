use anyhow::Context;
use serde_json::json;
use tracing::{error, warn};

use codebook_worker::{
    app::AppContext,
    config::{Config, DatabaseConfig},
    observability,
    pipeline::{coding, summary, summary::ThemeSummaryReport},
    store::{PgCommentStore, connect_pool},
};

/// 起動モード。引数ひとつなら Mode A（サマリー）、無引数なら Mode B
/// （全未分類コメントのオープンコーディング）、`--report-id <id>` で
/// 1レポートに絞った Mode B。
#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Summary(String),
    Coding(Option<i64>),
}

fn parse_mode(args: &[String]) -> Result<Mode, String> {
    match args {
        [] => Ok(Mode::Coding(None)),
        [flag, id] if flag == "--report-id" => id
            .parse::<i64>()
            .map(|rid| Mode::Coding(Some(rid)))
            .map_err(|_| format!("invalid report id: {id}")),
        [path] if path != "--report-id" => Ok(Mode::Summary(path.clone())),
        _ => Err("usage: codebook-worker [<summary-json-path> | --report-id <id>]".to_string()),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    if let Err(init_error) = observability::init() {
        eprintln!("failed to initialize tracing: {init_error}");
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_mode(&args) {
        Ok(Mode::Summary(path)) => run_summary_mode(&path).await,
        Ok(Mode::Coding(report_id)) => run_coding_mode(report_id).await,
        Err(message) => error!(message = %message, "invalid arguments"),
    }

    // 終了コードは常に0。失敗は stderr（Mode A ではさらに stdout の
    // {"error": ...}）で報告する。
}

async fn run_summary_mode(path: &str) {
    let report = match try_summary(path).await {
        Ok(report) => report,
        Err(run_error) => {
            error!(error = %format!("{run_error:#}"), "summary mode failed");
            let fallback = json!({ "error": format!("{run_error:#}") });
            println!(
                "{}",
                serde_json::to_string_pretty(&fallback).unwrap_or_default()
            );
            return;
        }
    };

    if report.summary.is_failure() {
        warn!("summary generation failed, report carries the error text instead");
    }

    match serde_json::to_string_pretty(&report.to_json()) {
        Ok(rendered) => println!("{rendered}"),
        Err(render_error) => error!(error = %render_error, "failed to render report JSON"),
    }
}

async fn try_summary(path: &str) -> anyhow::Result<ThemeSummaryReport> {
    let config = Config::from_env().context("failed to load configuration")?;
    let ctx = AppContext::build(config)?;
    summary::run_summary_file(
        ctx.completion(),
        ctx.config().openai_temperature(),
        ctx.config().openai_max_tokens(),
        path,
    )
    .await
}

async fn run_coding_mode(report_id: Option<i64>) {
    if let Err(run_error) = try_coding(report_id).await {
        error!(error = %format!("{run_error:#}"), "error in open coding");
    }
}

async fn try_coding(report_id: Option<i64>) -> anyhow::Result<u64> {
    let config = Config::from_env().context("failed to load configuration")?;
    let db_config =
        DatabaseConfig::from_env().context("failed to load database configuration")?;
    let ctx = AppContext::build(config)?;
    let pool = connect_pool(&db_config).await?;
    let store = PgCommentStore::new(pool);

    coding::run_open_coding(&ctx, &store, report_id).await
}
