//! テーマサマリーパイプライン（Mode A）。
//!
//! テーマ頻度を降順（同率は入力順）に並べてトップ5を選び、1回の補完
//! 呼び出しで要約を生成する。パイプライン自体は決して失敗しない。
//! 成否は [`SummaryOutcome`] として型で持ち、文字列化はレポートの
//! シリアライズ境界まで遅延させる。

use std::fs;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::clients::{CompletionClient, CompletionError};
use crate::pipeline::prompt;

/// テーマがひとつも無いときの定型サマリー。
pub const NO_THEMES_SUMMARY: &str = "No themes were identified in the student feedback.";

/// レポートに載せるトップテーマの上限。
pub const TOP_THEME_LIMIT: usize = 5;

/// サマリー入力ファイルの形。マッピングは挿入順を保持する。
#[derive(Debug, Default, Deserialize)]
pub struct SummaryInput {
    #[serde(default)]
    pub themes: IndexMap<String, i64>,
    #[serde(default)]
    pub comments_by_theme: IndexMap<String, Vec<String>>,
}

/// 要約生成の結果。
#[derive(Debug)]
pub enum SummaryOutcome {
    /// モデルが生成した要約テキスト。
    Generated(String),
    /// 入力にテーマが無く、補完呼び出しを行わなかった。
    NoThemes,
    /// 補完呼び出しが失敗した。レポートは失敗文言入りで生成される。
    Failed(CompletionError),
}

impl SummaryOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// レポートの `summary` フィールドに載せるテキスト表現。
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Generated(text) => text.clone(),
            Self::NoThemes => NO_THEMES_SUMMARY.to_string(),
            Self::Failed(error) => format!("Error summarizing with OpenAI: {error}"),
        }
    }
}

/// 1回の起動で生成されるサマリーレポート。
#[derive(Debug)]
pub struct ThemeSummaryReport {
    pub summary: SummaryOutcome,
    pub top_5_themes: IndexMap<String, i64>,
    pub related_comments: IndexMap<String, Vec<String>>,
}

impl ThemeSummaryReport {
    /// stdout へ出力する JSON 表現。キーとテーマの順序を保つ。
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "summary": self.summary.to_text(),
            "top_5_themes": self.top_5_themes,
            "related_comments": self.related_comments,
        })
    }
}

/// 頻度降順・同率は挿入順のまま、先頭 `limit` 件を選ぶ。
#[must_use]
pub fn extract_top_themes(
    themes: &IndexMap<String, i64>,
    limit: usize,
) -> IndexMap<String, i64> {
    let mut ranked: Vec<(&String, &i64)> = themes.iter().collect();
    // 安定ソートなので同率の相対順序（挿入順）は保たれる。
    ranked.sort_by(|a, b| b.1.cmp(a.1));
    ranked
        .into_iter()
        .take(limit)
        .map(|(name, count)| (name.clone(), *count))
        .collect()
}

/// サマリーレポートを生成する。テーマが無ければ補完呼び出しなしで
/// 定型文レポートを返す。
pub async fn run_summary(
    client: &CompletionClient,
    input: SummaryInput,
    temperature: f64,
    max_tokens: u32,
) -> ThemeSummaryReport {
    let top_themes = extract_top_themes(&input.themes, TOP_THEME_LIMIT);
    debug!(
        total_themes = input.themes.len(),
        top_themes = top_themes.len(),
        "ranked themes for summary"
    );

    if top_themes.is_empty() {
        warn!("no themes found for summary generation");
        return ThemeSummaryReport {
            summary: SummaryOutcome::NoThemes,
            top_5_themes: IndexMap::new(),
            related_comments: IndexMap::new(),
        };
    }

    let prompt_text = prompt::summary_prompt(&top_themes, &input.comments_by_theme);
    debug!(prompt_chars = prompt_text.len(), "built summary prompt");

    let summary = match client
        .complete(
            Some(prompt::SUMMARY_SYSTEM_PROMPT),
            &prompt_text,
            temperature,
            Some(max_tokens),
        )
        .await
    {
        Ok(text) => SummaryOutcome::Generated(text),
        Err(error) => {
            warn!(error = %error, "summary completion failed");
            SummaryOutcome::Failed(error)
        }
    };

    // プロンプトには3件までしか載せないが、レポートには各テーマの
    // 既知の例文を全て載せる。
    let related_comments = top_themes
        .keys()
        .map(|theme| {
            (
                theme.clone(),
                input
                    .comments_by_theme
                    .get(theme)
                    .cloned()
                    .unwrap_or_default(),
            )
        })
        .collect();

    ThemeSummaryReport {
        summary,
        top_5_themes: top_themes,
        related_comments,
    }
}

/// サマリー入力ファイルを読み込み、レポートを生成する。
///
/// # Errors
/// ファイルが読めない、または JSON のパースに失敗した場合はエラーを返す
/// （呼び出し側が `{"error": ...}` として stdout に流す）。
pub async fn run_summary_file(
    client: &CompletionClient,
    temperature: f64,
    max_tokens: u32,
    path: &str,
) -> Result<ThemeSummaryReport> {
    debug!(path, "processing summary input file");
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read summary input file {path}"))?;
    let input: SummaryInput =
        serde_json::from_str(&raw).context("failed to parse summary input JSON")?;
    debug!(
        themes = input.themes.len(),
        comment_themes = input.comments_by_theme.len(),
        "loaded theme frequencies"
    );

    Ok(run_summary(client, input, temperature, max_tokens).await)
}
