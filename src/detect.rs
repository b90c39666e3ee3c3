use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::language::Language;
use crate::llm::{OutputMode, TextGenerator};
use crate::terminology::TermTable;

/// Outcome of one generative detection pass
#[derive(Debug, Clone)]
pub struct DetectionReport {
    /// The model's rewritten transcript, or the original text when the
    /// response could not be parsed
    pub transcript: String,
    /// Canonical target-language terms, deduplicated, in claimed order of
    /// first occurrence. Claims the table cannot resolve pass through as-is.
    pub terms: Vec<String>,
    pub elapsed: Duration,
}

/// Expected response shape from the detection prompt
#[derive(Debug, Deserialize)]
struct DetectionPayload {
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    proper_nouns: Vec<String>,
}

/// Finds terminology occurrences in raw transcript text by prompting a
/// generation model with the full surface-form allow-list.
///
/// The model's inline replacements are advisory only; placeholder insertion
/// is left to a later pattern-matcher pass over the returned transcript.
pub struct GenerativeDetector {
    table: Arc<TermTable>,
    generator: Arc<dyn TextGenerator>,
    language: Language,
}

impl GenerativeDetector {
    pub fn new(
        table: Arc<TermTable>,
        generator: Arc<dyn TextGenerator>,
        language: Language,
    ) -> Self {
        Self {
            table,
            generator,
            language,
        }
    }

    /// Run detection over the full raw text. A generation failure (after the
    /// model fallback) propagates; an unparseable response does not.
    pub async fn detect(&self, transcript: &str) -> Result<DetectionReport> {
        let started = Instant::now();

        if self.table.is_empty() {
            return Ok(DetectionReport {
                transcript: transcript.to_string(),
                terms: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        let prompt = self.build_detection_prompt(transcript);
        debug!(
            "Requesting terminology detection ({} allow-listed forms)",
            self.table.all_surface_forms_longest_first().len()
        );

        let raw = self.generator.generate(&prompt, OutputMode::Json).await?;
        let (model_transcript, claims) = parse_detection_response(&raw, transcript);

        let mut terms: Vec<String> = Vec::new();
        for claim in claims {
            let canonical = self.table.canonical_target(&claim, self.language);
            if canonical.is_empty() {
                continue;
            }
            if !terms.contains(&canonical) {
                terms.push(canonical);
            }
        }

        Ok(DetectionReport {
            transcript: model_transcript,
            terms,
            elapsed: started.elapsed(),
        })
    }

    fn build_detection_prompt(&self, transcript: &str) -> String {
        let allow_list = self.table.all_surface_forms_longest_first().join(", ");
        format!(
            "You are a terminology standardization assistant.\n\
             \n\
             Known proper nouns: {}\n\
             \n\
             Analyze the transcript below and find every proper noun from the list above.\n\
             Rewrite the transcript with each occurrence replaced by the standard spelling \
             from the list; variants such as casing differences or abbreviations must be \
             unified to the listed form.\n\
             List each detected proper noun once in `proper_nouns`, in the order of first \
             appearance in the transcript. Only report terms from the list above.\n\
             \n\
             Return ONLY a JSON object in this exact format:\n\
             {{\n\
               \"transcript\": \"the rewritten transcript\",\n\
               \"proper_nouns\": [\"first term\", \"second term\"]\n\
             }}\n\
             \n\
             [Transcript]\n\
             {}",
            allow_list, transcript
        )
    }
}

/// Extract the structural payload from text that may be wrapped in a fenced
/// code block. Unfenced text passes through trimmed; a fence that opens but
/// never closes yields None.
pub(crate) fn unwrap_code_fence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return Some(trimmed);
    };
    // the opening fence line carries an optional info string such as "json"
    let (_, body) = rest.split_once('\n')?;
    let body = body.trim_end().strip_suffix("```")?;
    Some(body.trim())
}

/// Parse the detection response defensively. Any structural failure falls
/// back to the original text with no claims; it is never an error.
fn parse_detection_response(raw: &str, original: &str) -> (String, Vec<String>) {
    let Some(payload) = unwrap_code_fence(raw) else {
        warn!("Detection response had an unterminated code fence, keeping original text");
        return (original.to_string(), Vec::new());
    };

    match serde_json::from_str::<DetectionPayload>(payload) {
        Ok(parsed) => (
            parsed
                .transcript
                .unwrap_or_else(|| original.to_string()),
            parsed.proper_nouns,
        ),
        Err(e) => {
            warn!("Detection response was not valid JSON ({}), keeping original text", e);
            (original.to_string(), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KoyuError;
    use crate::llm::MockTextGenerator;
    use crate::terminology::TermEntry;

    fn sample_table() -> Arc<TermTable> {
        let mut docker = TermEntry::default();
        docker
            .surface_forms
            .insert(Language::ChineseTraditional, "容器".to_string());
        docker
            .surface_forms
            .insert(Language::English, "Docker".to_string());
        docker
            .surface_forms
            .insert(Language::Japanese, "ドッカー".to_string());

        let mut bigquery = TermEntry::default();
        bigquery
            .surface_forms
            .insert(Language::English, "BigQuery".to_string());

        Arc::new(TermTable::from_entries(vec![docker, bigquery]))
    }

    #[test]
    fn test_unwrap_code_fence_passes_plain_text_through() {
        assert_eq!(unwrap_code_fence("  {\"a\": 1}  "), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_unwrap_code_fence_strips_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(unwrap_code_fence(fenced), Some("{\"a\": 1}"));

        let bare_fence = "```\n{\"a\": 1}\n```\n";
        assert_eq!(unwrap_code_fence(bare_fence), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_unwrap_code_fence_rejects_unterminated_fence() {
        assert_eq!(unwrap_code_fence("```json\n{\"a\": 1}"), None);
        assert_eq!(unwrap_code_fence("```"), None);
    }

    #[test]
    fn test_parse_falls_back_to_original_on_garbage() {
        let (transcript, claims) = parse_detection_response("not json at all", "original");
        assert_eq!(transcript, "original");
        assert!(claims.is_empty());
    }

    #[test]
    fn test_parse_defaults_missing_fields() {
        let (transcript, claims) = parse_detection_response("{}", "original");
        assert_eq!(transcript, "original");
        assert!(claims.is_empty());

        let (transcript, claims) =
            parse_detection_response("{\"proper_nouns\": [\"A\"]}", "original");
        assert_eq!(transcript, "original");
        assert_eq!(claims, vec!["A"]);
    }

    #[tokio::test]
    async fn test_detect_canonicalizes_and_dedups_claims() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().returning(|_, _| {
            Ok("```json\n{\"transcript\": \"我們用 Docker 部署\", \
                \"proper_nouns\": [\"docker\", \"容器\", \"BigQuery\"]}\n```"
                .to_string())
        });

        let detector = GenerativeDetector::new(
            sample_table(),
            Arc::new(generator),
            Language::Japanese,
        );
        let report = detector.detect("raw text").await.unwrap();

        assert_eq!(report.transcript, "我們用 Docker 部署");
        // both claims resolve to the same concept; BigQuery has no Japanese
        // form so its English surface is the canonical target here
        assert_eq!(report.terms, vec!["ドッカー", "BigQuery"]);
    }

    #[tokio::test]
    async fn test_detect_carries_hallucinated_terms_through() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().returning(|_, _| {
            Ok("{\"transcript\": \"t\", \"proper_nouns\": [\"Nonexistent\"]}".to_string())
        });

        let detector = GenerativeDetector::new(
            sample_table(),
            Arc::new(generator),
            Language::English,
        );
        let report = detector.detect("raw text").await.unwrap();
        assert_eq!(report.terms, vec!["Nonexistent"]);
    }

    #[tokio::test]
    async fn test_detect_recovers_from_unparseable_response() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Ok("Sorry, I cannot help with that.".to_string()));

        let detector = GenerativeDetector::new(
            sample_table(),
            Arc::new(generator),
            Language::English,
        );
        let report = detector.detect("the raw transcript").await.unwrap();
        assert_eq!(report.transcript, "the raw transcript");
        assert!(report.terms.is_empty());
    }

    #[tokio::test]
    async fn test_detect_propagates_generation_failure() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Err(KoyuError::Generation("both models down".to_string())));

        let detector = GenerativeDetector::new(
            sample_table(),
            Arc::new(generator),
            Language::English,
        );
        assert!(detector.detect("text").await.is_err());
    }

    #[tokio::test]
    async fn test_detect_skips_model_for_empty_table() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().times(0);

        let detector = GenerativeDetector::new(
            Arc::new(TermTable::from_entries(vec![])),
            Arc::new(generator),
            Language::English,
        );
        let report = detector.detect("unchanged").await.unwrap();
        assert_eq!(report.transcript, "unchanged");
        assert!(report.terms.is_empty());
    }

    #[test]
    fn test_prompt_lists_allow_list_and_transcript() {
        let generator = MockTextGenerator::new();
        let detector = GenerativeDetector::new(
            sample_table(),
            Arc::new(generator),
            Language::English,
        );
        let prompt = detector.build_detection_prompt("meeting notes");
        assert!(prompt.contains("BigQuery"));
        assert!(prompt.contains("ドッカー"));
        assert!(prompt.contains("meeting notes"));
        assert!(prompt.contains("\"proper_nouns\""));
    }
}
