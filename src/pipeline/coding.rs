//! オープンコーディング（Mode B）：未分類コメントをコードブックに
//! 照らして分類し、テーマを書き戻す。
//!
//! バッチは厳密に1つずつ処理する。補完呼び出しの失敗・出力のデコード
//! 失敗・コミット失敗はそのバッチを捨てて次へ進む（リトライなし）。
//! 捨てられたコメントは `categories` が NULL のまま残り、次回の実行で
//! 再び選択される。

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app::AppContext;
use crate::codebook::Codebook;
use crate::pipeline::{batch, parse, prompt};
use crate::store::CommentStore;

/// 分類呼び出しの温度。サマリー側の設定値とは独立。
const CLASSIFY_TEMPERATURE: f64 = 0.3;

/// デコード失敗時にログへ残す生出力の先頭文字数。
const RAW_PREVIEW_CHARS: usize = 500;

/// 分類バッチループを実行し、更新した行数を返す。
///
/// # Errors
/// コードブックの読み込みと未分類コメントの取得に失敗した場合はエラーを
/// 返す。バッチ単位の失敗はログに記録してスキップする。
pub async fn run_open_coding(
    ctx: &AppContext,
    store: &impl CommentStore,
    report_id: Option<i64>,
) -> Result<u64> {
    let codebook = Codebook::load(ctx.config().codebook_path())
        .context("failed to load standardized codebook")?;
    if codebook.is_empty() {
        warn!("codebook has no categories, every comment will come back unthemed");
    }

    match report_id {
        Some(rid) => info!(report_id = rid, "running open coding for report"),
        None => info!("running open coding for all unclassified comments"),
    }

    let pending = store
        .fetch_unclassified(report_id)
        .await
        .context("failed to read pending comments")?;

    if pending.is_empty() {
        info!("no unclassified comments found");
        return Ok(0);
    }

    let header = prompt::classification_header(&codebook)?;
    let header_tokens = ctx.token_counter().count(&header);
    let batches = batch::plan_batches(
        ctx.token_counter(),
        &pending,
        header_tokens,
        ctx.config().max_prompt_tokens(),
    );

    info!(
        pending = pending.len(),
        batches = batches.len(),
        categories = codebook.len(),
        header_tokens,
        "planned classification batches"
    );

    let mut total_updated = 0u64;
    for (batch_index, planned) in batches.iter().enumerate() {
        let full_prompt = format!("{header}{}", planned.body);

        let raw = match ctx
            .completion()
            .complete(None, &full_prompt, CLASSIFY_TEMPERATURE, None)
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    batch = batch_index,
                    comments = planned.comments.len(),
                    error = %error,
                    "completion call failed, skipping batch"
                );
                continue;
            }
        };

        let assignments = match parse::parse_assignments(&raw, planned.comments.len()) {
            Ok(assignments) => assignments,
            Err(error) => {
                let preview: String = raw.chars().take(RAW_PREVIEW_CHARS).collect();
                warn!(
                    batch = batch_index,
                    error = %error,
                    raw = %preview,
                    "failed to decode completion output, skipping batch"
                );
                continue;
            }
        };

        let updates: Vec<(i64, Vec<String>)> = planned
            .comments
            .iter()
            .zip(assignments)
            .map(|(row, themes)| (row.cid, themes))
            .collect();

        match store.assign_categories(&updates).await {
            Ok(updated) => {
                total_updated += updated;
                info!(batch = batch_index, updated, "batch committed");
            }
            Err(error) => {
                warn!(
                    batch = batch_index,
                    error = %format!("{error:#}"),
                    "failed to persist batch, skipping"
                );
            }
        }
    }

    info!(total_updated, "open coding complete");
    Ok(total_updated)
}
