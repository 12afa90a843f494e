//! プロンプト生成。全て決定的な純関数。
//!
//! ヘッダは実行ごとに一度だけレンダリングしてトークン数を測り、全バッチで
//! 再利用する。コメント断片はここで作った文字列がそのまま本文に連結される
//! 前提なので、バッチプランナーと同じ関数を必ず通すこと。

use std::fmt::Write as _;

use anyhow::Result;
use indexmap::IndexMap;

use crate::codebook::Codebook;

/// サマリー呼び出しの system メッセージ。
pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that summarizes student feedback.";

/// 各テーマについてプロンプトに埋め込む例文の上限。
/// レポートの `related_comments` はこの制限を受けない。
pub const PROMPT_EXAMPLES_PER_THEME: usize = 3;

/// 分類プロンプトの固定ヘッダ（指示文 + コードブック）をレンダリングする。
///
/// # Errors
/// コードブックのシリアライズに失敗した場合はエラーを返す。
pub fn classification_header(codebook: &Codebook) -> Result<String> {
    let codebook_json = codebook.to_pretty_json()?;
    Ok(format!(
        r#"
You are a qualitative researcher analyzing individual student comments to identify specific themes.
For each batch, carefully read each individual comment, then identify the most relevant theme(s) from the codebook below. Each comment should be analyzed independently - don't group similar or subsequent comments together.

The codebook below contains a list of categories. Each category includes:
- A definition of what the category means
- Two or three example student comments

CODEBOOK:
"""
{codebook_json}
"""
Instructions:
- Analyze each comment individually and independently
- Look at the specific content of each comment, not patterns across comments
- Assign 1-3 most relevant themes per comment based on the actual content
- If a comment doesn't clearly fit any theme, assign an empty array []
- Be precise - don't force comments into themes that don't match
Return your answer in strict JSON like this:
{{
  "Comment 1": ["clarity", "engagement"],
  "Comment 2": [],
  ...
}}
Now analyze each of these comments individually:
"#
    ))
}

/// バッチ内 `index` 番目（1始まり）のコメント断片をレンダリングする。
#[must_use]
pub fn comment_fragment(index: usize, text: &str) -> String {
    format!("\nComment {index}:\n{text}\n")
}

/// サマリー生成プロンプトをレンダリングする。
///
/// 各トップテーマの名前・言及回数・最大3件の例文を埋め込む。
#[must_use]
pub fn summary_prompt(
    top_themes: &IndexMap<String, i64>,
    comments_by_theme: &IndexMap<String, Vec<String>>,
) -> String {
    let theme_list = top_themes
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    let mut comment_examples = String::new();
    for (theme, count) in top_themes {
        let Some(comments) = comments_by_theme.get(theme) else {
            continue;
        };
        if comments.is_empty() {
            continue;
        }
        let _ = write!(
            comment_examples,
            "\n**{theme}** (mentioned {count} times):\n"
        );
        for (i, comment) in comments.iter().take(PROMPT_EXAMPLES_PER_THEME).enumerate() {
            let _ = writeln!(comment_examples, "  {}. \"{comment}\"", i + 1);
        }
    }

    format!(
        "You are summarizing student feedback themes for a college course.\n\
         Take these top 5 most frequently mentioned themes. For each theme:\n\
         - Start with the theme title as a bold heading (use markdown **bold**).\n\
         - Then write a 2-3 sentence paragraph summarizing how that theme showed up in the feedback.\n\
         Keep the tone professional, clear, and concise.\n\n\
         Top themes to analyze: {theme_list}\n\n\
         Here are example comments for each theme:{comment_examples}\n\
         Provide a structured summary based on these specific comments and themes from the student feedback."
    )
}
