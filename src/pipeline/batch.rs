//! 貪欲なトークン予算ベースのバッチプランナー。
//!
//! 入力順を保ったまま、ヘッダ + 本文が予算に収まる最大のバッチを前から
//! 順に切り出す。先読みも並べ替えも分割もしない。断片のトークン数は
//! 個別に測って加算する（連結時の BPE マージは考慮しない近似。予算側に
//! 若干の余裕が生まれる方向に倒れる）。

use tracing::warn;

use crate::clients::TokenCounter;
use crate::pipeline::prompt;
use crate::store::models::PendingComment;

/// 1回の補完リクエストに載せるコメント群と、レンダリング済みの本文。
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBatch {
    pub comments: Vec<PendingComment>,
    pub body: String,
}

/// 未分類コメント列をトークン予算内のバッチ列へ貪欲に詰める。
///
/// 予算に収まらない最初のコメントでバッチを閉じる。バッチ先頭のコメントが
/// 単体で予算を超える場合は、断片が収まるまで本文を切り詰めて採用する。
/// 切り詰めても収まらないコメントは警告を出してスキップし、未分類のまま
/// 残す。どの経路でもカーソルは必ず前進する。
#[must_use]
pub fn plan_batches(
    counter: &TokenCounter,
    pending: &[PendingComment],
    header_tokens: usize,
    max_prompt_tokens: usize,
) -> Vec<PlannedBatch> {
    let per_batch_budget = max_prompt_tokens.saturating_sub(header_tokens);
    let mut batches = Vec::new();
    let mut cursor = 0;

    while cursor < pending.len() {
        let mut remaining = per_batch_budget;
        let mut comments = Vec::new();
        let mut body = String::new();

        while cursor < pending.len() {
            let row = &pending[cursor];
            let fragment = prompt::comment_fragment(comments.len() + 1, &row.text);
            let cost = counter.count(&fragment);

            if cost >= remaining {
                if !comments.is_empty() {
                    break;
                }

                // バッチ先頭のコメントが単体で予算超過。
                match fit_oversize(counter, comments.len() + 1, &row.text, remaining) {
                    Some((fragment, cost)) => {
                        warn!(
                            cid = row.cid,
                            fragment_tokens = counter.count(&fragment),
                            budget = remaining,
                            "comment exceeds batch budget, truncating text to fit"
                        );
                        body.push_str(&fragment);
                        remaining -= cost;
                        comments.push(row.clone());
                    }
                    None => {
                        warn!(
                            cid = row.cid,
                            budget = remaining,
                            "comment cannot fit the prompt budget even truncated, skipping"
                        );
                    }
                }
                cursor += 1;
                continue;
            }

            body.push_str(&fragment);
            remaining -= cost;
            comments.push(row.clone());
            cursor += 1;
        }

        if !comments.is_empty() {
            batches.push(PlannedBatch { comments, body });
        }
    }

    batches
}

/// 予算超過コメントを切り詰めて予算内の断片にする。収まる形が作れない
/// 場合は `None`。
fn fit_oversize(
    counter: &TokenCounter,
    index: usize,
    text: &str,
    budget: usize,
) -> Option<(String, usize)> {
    let overhead = counter.count(&prompt::comment_fragment(index, ""));
    if budget <= overhead + 1 {
        return None;
    }

    // 断片全体の再計測はトークンのマージで見積もりとずれ得るので、
    // 収まるまで本文予算を縮めて再試行する。
    let mut text_budget = budget - overhead - 1;
    loop {
        let truncated = counter.truncate(text, text_budget);
        let fragment = prompt::comment_fragment(index, &truncated);
        let cost = counter.count(&fragment);
        if cost < budget {
            return Some((fragment, cost));
        }
        if text_budget == 0 {
            return None;
        }
        text_budget = text_budget.saturating_sub(cost - budget + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> TokenCounter {
        TokenCounter::for_model("gpt-3.5-turbo").expect("tokenizer loads")
    }

    fn comment(cid: i64, text: &str) -> PendingComment {
        PendingComment {
            cid,
            text: text.to_string(),
        }
    }

    fn rebuilt_body(batch: &PlannedBatch) -> String {
        batch
            .comments
            .iter()
            .enumerate()
            .map(|(i, row)| prompt::comment_fragment(i + 1, &row.text))
            .collect()
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let batches = plan_batches(&counter(), &[], 100, 10_000);
        assert!(batches.is_empty());
    }

    #[test]
    fn everything_fits_in_one_batch() {
        let counter = counter();
        let pending = vec![
            comment(1, "The lectures were clear."),
            comment(2, "More practice problems please."),
            comment(3, "Loved the group projects."),
        ];

        let batches = plan_batches(&counter, &pending, 100, 10_000);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].comments, pending);
        assert_eq!(batches[0].body, rebuilt_body(&batches[0]));
    }

    #[test]
    fn tight_budget_splits_batches_without_drops_or_reordering() {
        let counter = counter();
        let pending: Vec<PendingComment> = (1..=8)
            .map(|cid| comment(cid, "This course moved a little too quickly for me."))
            .collect();

        let header_tokens = 50;
        let fragment_cost = counter.count(&prompt::comment_fragment(1, &pending[0].text));
        // 1バッチにつきコメント2件分強しか入らない予算にする。
        let max_prompt_tokens = header_tokens + fragment_cost * 2 + 2;

        let batches = plan_batches(&counter, &pending, header_tokens, max_prompt_tokens);

        assert!(batches.len() > 1, "budget should force multiple batches");

        // 予算の遵守: ヘッダ + 各断片コストの合計が上限以下。
        for batch in &batches {
            let body_cost: usize = batch
                .comments
                .iter()
                .enumerate()
                .map(|(i, row)| counter.count(&prompt::comment_fragment(i + 1, &row.text)))
                .sum();
            assert!(header_tokens + body_cost <= max_prompt_tokens);
            assert_eq!(batch.body, rebuilt_body(batch));
        }

        // 全コメントが順序通りちょうど一度ずつ現れる。
        let flattened: Vec<i64> = batches
            .iter()
            .flat_map(|batch| batch.comments.iter().map(|row| row.cid))
            .collect();
        assert_eq!(flattened, (1..=8).collect::<Vec<i64>>());
    }

    #[test]
    fn oversize_comment_is_truncated_but_still_classified() {
        let counter = counter();
        let long_text = "students kept asking for more worked examples ".repeat(100);
        let pending = vec![comment(7, &long_text), comment(8, "Short and sweet.")];

        let header_tokens = 20;
        let max_prompt_tokens = 80;

        let batches = plan_batches(&counter, &pending, header_tokens, max_prompt_tokens);

        assert_eq!(batches.len(), 2, "oversize comment closes its own batch");
        assert_eq!(batches[0].comments[0].cid, 7);
        assert!(
            counter.count(&batches[0].body) < max_prompt_tokens - header_tokens,
            "truncated body must fit the per-batch budget"
        );
        assert_eq!(batches[1].comments[0].cid, 8);
    }

    #[test]
    fn impossible_budget_skips_comment_and_advances() {
        let counter = counter();
        let pending = vec![
            comment(1, "way too long for a two-token budget"),
            comment(2, "also impossible"),
        ];

        // ヘッダだけでほぼ予算を使い切っている。
        let batches = plan_batches(&counter, &pending, 9_999, 10_000);

        assert!(batches.is_empty(), "nothing can fit, nothing is planned");
    }
}
