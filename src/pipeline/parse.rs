//! 分類結果（モデル出力）のデコード。

use anyhow::{Context, Result};
use serde_json::Value;

/// モデル出力を `"Comment {1始まりの番号}"` → テーマ配列の JSON として
/// デコードし、バッチ内の順序に揃えたテーマ配列列を返す。
///
/// 欠けているキーと配列でない値は空配列に落とす。配列内の文字列以外の
/// 要素は捨てる。JSON として不正、またはトップレベルがオブジェクトで
/// ない場合はバッチ全体の失敗。
///
/// # Errors
/// 出力が JSON オブジェクトとしてパースできない場合はエラーを返す。
pub fn parse_assignments(raw: &str, batch_len: usize) -> Result<Vec<Vec<String>>> {
    let value: Value =
        serde_json::from_str(raw).context("completion output is not valid JSON")?;
    let map = value
        .as_object()
        .context("completion output is not a JSON object")?;

    let mut assignments = Vec::with_capacity(batch_len);
    for index in 1..=batch_len {
        let key = format!("Comment {index}");
        let themes = map
            .get(&key)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        assignments.push(themes);
    }

    Ok(assignments)
}
