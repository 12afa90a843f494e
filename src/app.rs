use anyhow::{Context, Result};

use crate::clients::{CompletionClient, TokenCounter};
use crate::config::Config;

/// パイプラインへ受け渡す依存コンポーネントの束。
///
/// トークナイザや API クライアントをモジュールレベルのシングルトンに
/// せず、ここで明示的に構築して引数として渡す。
#[derive(Clone)]
pub struct AppContext {
    config: Config,
    token_counter: TokenCounter,
    completion: CompletionClient,
}

impl AppContext {
    /// 設定値から全コンポーネントを構築する。
    ///
    /// # Errors
    /// トークナイザまたは HTTP クライアントの初期化に失敗した場合は
    /// エラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let token_counter = TokenCounter::for_model(config.openai_model())
            .context("failed to initialize token counter")?;
        let completion = CompletionClient::new(
            config.openai_base_url(),
            config.openai_api_key(),
            config.openai_model(),
        )
        .context("failed to initialize completion client")?;

        Ok(Self::new(config, token_counter, completion))
    }

    /// 構築済みコンポーネントから組み立てる（テストや特殊な配線用）。
    #[must_use]
    pub fn new(
        config: Config,
        token_counter: TokenCounter,
        completion: CompletionClient,
    ) -> Self {
        Self {
            config,
            token_counter,
            completion,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn token_counter(&self) -> &TokenCounter {
        &self.token_counter
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionClient {
        &self.completion
    }
}
