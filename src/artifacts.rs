use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tracing::info;

use crate::error::Result;
use crate::language::Language;

const RULE_WIDTH: usize = 50;

/// Writes the per-language output artifacts for one processing run.
/// Earlier artifacts stay on disk when a later stage fails; nothing is
/// rolled back.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Create the writer, ensuring the output directory exists
    pub async fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, prefix: &str, language: Language) -> PathBuf {
        self.dir.join(format!("{}_{}.txt", prefix, language.code()))
    }

    /// Pattern-matcher occurrence log, 1-indexed, in text order
    pub async fn write_term_log(
        &self,
        language: Language,
        occurrences: &[String],
        elapsed: Duration,
    ) -> Result<PathBuf> {
        let mut content = format!(
            "Pattern detection results ({}, elapsed: {:.2}s)\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            elapsed.as_secs_f64()
        );
        for (idx, term) in occurrences.iter().enumerate() {
            content.push_str(&format!("{}. {}\n", idx + 1, term));
        }

        let path = self.path_for("term", language);
        tokio::fs::write(&path, content).await?;
        info!("Term log written to {}", path.display());
        Ok(path)
    }

    /// Generative-detector term log, 1-indexed, in claimed order
    pub async fn write_detection_log(
        &self,
        language: Language,
        terms: &[String],
        elapsed: Duration,
    ) -> Result<PathBuf> {
        let mut content = format!(
            "LLM proper noun detection ({}, elapsed: {:.2}s)\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            elapsed.as_secs_f64()
        );
        content.push_str(&"=".repeat(RULE_WIDTH));
        content.push('\n');
        for (idx, term) in terms.iter().enumerate() {
            content.push_str(&format!("{}. {}\n", idx + 1, term));
        }
        content.push_str(&"-".repeat(RULE_WIDTH));
        content.push('\n');

        let path = self.path_for("llm_detection", language);
        tokio::fs::write(&path, content).await?;
        info!("Detection log written to {}", path.display());
        Ok(path)
    }

    /// Description table, `term: description` per line; absent descriptions
    /// render as the N/A marker
    pub async fn write_descriptions(
        &self,
        language: Language,
        rows: &[(String, Option<String>)],
    ) -> Result<PathBuf> {
        let mut content = String::new();
        for (term, description) in rows {
            content.push_str(&format!(
                "{}: {}\n",
                term,
                description.as_deref().unwrap_or("N/A")
            ));
        }

        let path = self.path_for("description", language);
        tokio::fs::write(&path, content).await?;
        info!("Description table written to {}", path.display());
        Ok(path)
    }

    /// Final translated transcript, placeholder delimiters already stripped
    pub async fn write_transcript(&self, language: Language, text: &str) -> Result<PathBuf> {
        let path = self.path_for("transcript", language);
        tokio::fs::write(&path, text).await?;
        info!("Transcript written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn test_term_log_is_one_indexed_with_elapsed_header() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).await.unwrap();

        let occurrences = vec!["大查詢".to_string(), "大查詢".to_string()];
        let path = writer
            .write_term_log(
                Language::ChineseTraditional,
                &occurrences,
                Duration::from_millis(1250),
            )
            .await
            .unwrap();

        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("term_cmn-Hant-TW.txt")
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Pattern detection results ("));
        assert!(content.contains("elapsed: 1.25s"));
        assert!(content.contains("\n1. 大查詢\n"));
        assert!(content.contains("\n2. 大查詢\n"));
    }

    #[tokio::test]
    async fn test_detection_log_carries_rules() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).await.unwrap();

        let terms = vec!["ドッカー".to_string()];
        let path = writer
            .write_detection_log(Language::Japanese, &terms, Duration::from_secs(3))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(&"=".repeat(50)));
        assert!(content.contains("1. ドッカー"));
        assert!(content.contains(&"-".repeat(50)));
    }

    #[tokio::test]
    async fn test_descriptions_render_na_marker() {
        let temp = assert_fs::TempDir::new().unwrap();
        let writer = ArtifactWriter::new(temp.path()).await.unwrap();

        let rows = vec![
            (
                "Docker".to_string(),
                Some("Container runtime".to_string()),
            ),
            ("EdgeTPU".to_string(), None),
        ];
        writer
            .write_descriptions(Language::English, &rows)
            .await
            .unwrap();

        temp.child("description_en-US.txt")
            .assert("Docker: Container runtime\nEdgeTPU: N/A\n");
    }

    #[test]
    fn test_transcript_written_verbatim() {
        let temp = assert_fs::TempDir::new().unwrap();
        tokio_test::block_on(async {
            let writer = ArtifactWriter::new(temp.path()).await.unwrap();
            writer
                .write_transcript(Language::German, "Hallo Welt\n")
                .await
                .unwrap();
        });
        temp.child("transcript_de-DE.txt").assert("Hallo Welt\n");
    }
}
