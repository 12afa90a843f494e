//! テスト用のインメモリ実装。

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::dao::CommentStore;
use super::models::PendingComment;

#[derive(Debug, Clone)]
pub(crate) struct MockRow {
    pub(crate) cid: i64,
    pub(crate) rid: i64,
    pub(crate) text: Option<String>,
    pub(crate) categories: Option<String>,
}

impl MockRow {
    pub(crate) fn pending(cid: i64, rid: i64, text: &str) -> Self {
        Self {
            cid,
            rid,
            text: Some(text.to_string()),
            categories: None,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct InMemoryCommentStore {
    rows: Mutex<Vec<MockRow>>,
}

impl InMemoryCommentStore {
    pub(crate) fn new(rows: Vec<MockRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub(crate) fn categories_of(&self, cid: i64) -> Option<String> {
        self.rows
            .lock()
            .expect("mock store lock")
            .iter()
            .find(|row| row.cid == cid)
            .and_then(|row| row.categories.clone())
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn fetch_unclassified(
        &self,
        report_id: Option<i64>,
    ) -> Result<Vec<PendingComment>> {
        let rows = self.rows.lock().expect("mock store lock");
        Ok(rows
            .iter()
            .filter(|row| report_id.is_none_or(|rid| row.rid == rid))
            .filter(|row| row.text.is_some() && row.categories.is_none())
            .map(|row| PendingComment {
                cid: row.cid,
                text: row.text.clone().unwrap_or_default(),
            })
            .collect())
    }

    async fn assign_categories(&self, updates: &[(i64, Vec<String>)]) -> Result<u64> {
        let mut rows = self.rows.lock().expect("mock store lock");
        let mut updated = 0u64;
        for (cid, themes) in updates {
            if let Some(row) = rows.iter_mut().find(|row| row.cid == *cid) {
                row.categories = Some(serde_json::to_string(themes)?);
                updated += 1;
            }
        }
        Ok(updated)
    }
}
