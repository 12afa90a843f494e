/// 分類待ちのコメント行。`categories` が NULL の行だけがここに乗る。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingComment {
    pub cid: i64,
    pub text: String,
}
