use std::sync::Arc;

use anyhow::{Context, Result};
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model};
use tracing::warn;

/// プロンプトのトークン数を計算するためのカウンタ。
///
/// モデル名から tiktoken のエンコーディングを解決する。未知のモデルは
/// cl100k_base にフォールバックする（警告ログ付き）。
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    /// 指定モデル用の TokenCounter を作成する。
    ///
    /// # Errors
    /// フォールバック先の cl100k_base エンコーディングすら読み込めない場合は
    /// エラーを返す。
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = match get_bpe_from_model(model) {
            Ok(bpe) => bpe,
            Err(error) => {
                warn!(
                    model,
                    error = %error,
                    "unknown tokenizer mapping for model, falling back to cl100k_base"
                );
                cl100k_base().context("failed to load cl100k_base encoding")?
            }
        };

        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// テキストのトークン数を計算する（特殊トークンは含めない）。
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// テキストを最大 `max_tokens` トークンに切り詰める。
    ///
    /// トークン境界がマルチバイト文字を分割する場合は、有効な UTF-8 に
    /// なるまで末尾のトークンをさらに削る。
    #[must_use]
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        let mut end = max_tokens;
        while end > 0 {
            if let Ok(truncated) = self.bpe.decode(tokens[..end].to_vec()) {
                return truncated;
            }
            end -= 1;
        }

        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_counts_tokens() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").expect("tokenizer should load");
        let count = counter.count("The lecture was engaging and well paced.");
        assert!(count > 0);
        assert!(count < 20);
    }

    #[test]
    fn unknown_model_falls_back_to_cl100k() {
        let counter =
            TokenCounter::for_model("totally-made-up-model").expect("fallback should load");
        assert!(counter.count("hello world") > 0);
    }

    #[test]
    fn empty_text_counts_zero() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").expect("tokenizer should load");
        assert_eq!(counter.count(""), 0);
    }

    #[test]
    fn truncate_respects_token_budget() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").expect("tokenizer should load");
        let text = "one two three four five six seven eight nine ten";
        let truncated = counter.truncate(text, 4);
        assert!(counter.count(&truncated) <= 4);
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn truncate_leaves_short_text_untouched() {
        let counter = TokenCounter::for_model("gpt-3.5-turbo").expect("tokenizer should load");
        let text = "short comment";
        assert_eq!(counter.truncate(text, 100), text);
    }
}
