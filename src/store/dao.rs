use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgPool, Row};

use crate::config::DatabaseConfig;

use super::models::PendingComment;

/// コメントテーブルへの読み書き。
///
/// select 側のフィルタ（`categories IS NULL`）が「分類済みコメントを
/// 二度選ばない」不変条件を担保する。
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// 未分類コメントを取得する。`report_id` を渡すと1レポートに絞る。
    async fn fetch_unclassified(&self, report_id: Option<i64>)
    -> Result<Vec<PendingComment>>;

    /// 1バッチ分のテーマ割り当てを1トランザクションでコミットする。
    /// 更新行数を返す。
    async fn assign_categories(&self, updates: &[(i64, Vec<String>)]) -> Result<u64>;
}

/// 環境設定から Postgres 接続プールを作成する。
///
/// 実行は完全に逐次なので、プールは1コネクション固定。
///
/// # Errors
/// 接続の確立に失敗した場合はエラーを返す。
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let ssl_mode = if config.ssl() {
        PgSslMode::Require
    } else {
        PgSslMode::Disable
    };

    let options = PgConnectOptions::new()
        .host(config.host())
        .port(config.port())
        .database(config.name())
        .username(config.user())
        .password(config.password())
        .ssl_mode(ssl_mode);

    PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .context("failed to connect to comments database")
}

/// 本番用の Postgres 実装。
#[derive(Debug, Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn fetch_unclassified(
        &self,
        report_id: Option<i64>,
    ) -> Result<Vec<PendingComment>> {
        let rows = match report_id {
            Some(rid) => {
                sqlx::query(
                    r"
                    SELECT cid, text FROM comments
                    WHERE rid = $1 AND text IS NOT NULL AND categories IS NULL
                    ORDER BY cid
                    ",
                )
                .bind(rid)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r"
                    SELECT cid, text FROM comments
                    WHERE text IS NOT NULL AND categories IS NULL
                    ORDER BY cid
                    ",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("failed to fetch unclassified comments")?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            let cid: i64 = row.try_get("cid")?;
            let text: String = row.try_get("text")?;
            comments.push(PendingComment { cid, text });
        }

        Ok(comments)
    }

    async fn assign_categories(&self, updates: &[(i64, Vec<String>)]) -> Result<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;

        let mut updated = 0u64;
        for (cid, themes) in updates {
            let categories =
                serde_json::to_string(themes).context("failed to serialize categories")?;
            let result = sqlx::query("UPDATE comments SET categories = $1 WHERE cid = $2")
                .bind(&categories)
                .bind(cid)
                .execute(&mut *tx)
                .await
                .context("failed to update comment categories")?;
            updated += result.rows_affected();
        }

        tx.commit()
            .await
            .context("failed to commit category updates")?;

        Ok(updated)
    }
}
