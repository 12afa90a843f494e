use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// コードブックファイルの1エントリ。ファイル側は配列形式。
#[derive(Debug, Deserialize)]
struct CodebookEntry {
    category: String,
    definition: String,
    #[serde(default)]
    examples: Vec<String>,
}

/// 1カテゴリーの定義と例文。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDefinition {
    pub definition: String,
    pub examples: Vec<String>,
}

/// カテゴリー名 → 定義の順序付きマッピング。
///
/// 読み込み後は不変。プロンプトへはファイルの出現順のまま
/// pretty-printed JSON として埋め込む。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Codebook(IndexMap<String, CategoryDefinition>);

impl Codebook {
    /// コードブックファイル（{category, definition, examples} の配列）を読み込む。
    ///
    /// 重複したカテゴリー名は後勝ちで、最初の出現位置を保つ。
    ///
    /// # Errors
    /// ファイルが読めない、または JSON のパースに失敗した場合はエラーを返す。
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read codebook file {}", path.display()))?;
        let entries: Vec<CodebookEntry> =
            serde_json::from_str(&raw).context("failed to parse codebook JSON")?;

        let mut categories = IndexMap::with_capacity(entries.len());
        for entry in entries {
            categories.insert(
                entry.category,
                CategoryDefinition {
                    definition: entry.definition,
                    examples: entry.examples,
                },
            );
        }

        Ok(Self(categories))
    }

    /// プロンプト埋め込み用の pretty-printed JSON 表現。
    ///
    /// # Errors
    /// シリアライズに失敗した場合はエラーを返す（実際には起こらない形だが
    /// 呼び出し側でまとめて扱う）。
    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize codebook")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_codebook(raw: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(raw.as_bytes()).expect("write codebook");
        file
    }

    #[test]
    fn load_preserves_file_order() {
        let file = write_codebook(
            r#"[
                {"category": "engagement", "definition": "Active participation", "examples": ["Fun class"]},
                {"category": "clarity", "definition": "Clear explanations", "examples": ["Easy to follow", "Well explained"]}
            ]"#,
        );

        let codebook = Codebook::load(file.path()).expect("codebook should load");

        assert_eq!(codebook.len(), 2);
        let rendered = codebook.to_pretty_json().expect("render");
        let engagement = rendered.find("engagement").expect("engagement present");
        let clarity = rendered.find("clarity").expect("clarity present");
        assert!(engagement < clarity, "file order should be preserved");
    }

    #[test]
    fn load_defaults_missing_examples() {
        let file = write_codebook(
            r#"[{"category": "pace", "definition": "Speed of the course"}]"#,
        );

        let codebook = Codebook::load(file.path()).expect("codebook should load");

        assert_eq!(codebook.len(), 1);
        assert!(codebook.to_pretty_json().expect("render").contains("\"examples\": []"));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let file = write_codebook("not json");

        let error = Codebook::load(file.path()).expect_err("should fail");

        assert!(error.to_string().contains("parse codebook"));
    }

    #[test]
    fn load_rejects_missing_file() {
        let error = Codebook::load("/nonexistent/codebook.json").expect_err("should fail");

        assert!(error.to_string().contains("read codebook"));
    }
}
