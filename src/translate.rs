use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::language::Language;
use crate::llm::{OutputMode, TextGenerator};

/// Translates placeholder-wrapped text while instructing the model to copy
/// `{...}` spans through untouched.
///
/// The protection is a prompt convention, not a guarantee: the model may
/// still reword a span or mangle the braces, so callers must finish with an
/// unconditional placeholder strip and should not assume 100% preservation.
pub struct ProtectedTranslator {
    generator: Arc<dyn TextGenerator>,
}

impl ProtectedTranslator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Translate to the target language. Failure of both the primary and
    /// fallback model surfaces as an error, never as untranslated text.
    pub async fn translate(&self, text: &str, language: Language) -> Result<String> {
        let prompt = build_translation_prompt(text, language);
        debug!(
            "Requesting {} translation ({} chars)",
            language.code(),
            text.chars().count()
        );
        let translated = self.generator.generate(&prompt, OutputMode::Text).await?;
        Ok(translated.trim().to_string())
    }
}

fn build_translation_prompt(text: &str, language: Language) -> String {
    format!(
        "You are a professional translator.\n\
         \n\
         Translate the text below to {} (language code: {}).\n\
         Spans wrapped in curly braces, such as {{Example}}, are protected terminology: \
         copy them through exactly as written, including the braces, and never translate \
         or reword them.\n\
         Everything outside the braces must be fully translated into {} with no \
         source-language remnants.\n\
         Return ONLY the translated text, without explanations.\n\
         \n\
         [Text]\n\
         {}",
        language.english_name(),
        language.code(),
        language.english_name(),
        text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KoyuError;
    use crate::llm::MockTextGenerator;

    #[test]
    fn test_prompt_marks_braced_spans_inviolate() {
        let prompt = build_translation_prompt("use {BigQuery} daily", Language::Japanese);
        assert!(prompt.contains("Japanese"));
        assert!(prompt.contains("ja-JP"));
        assert!(prompt.contains("curly braces"));
        assert!(prompt.contains("use {BigQuery} daily"));
    }

    #[tokio::test]
    async fn test_translate_returns_trimmed_model_output() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Ok("  {大查詢}を毎日使う  ".to_string()));

        let translator = ProtectedTranslator::new(Arc::new(generator));
        let translated = translator
            .translate("use {大查詢} daily", Language::Japanese)
            .await
            .unwrap();
        assert_eq!(translated, "{大查詢}を毎日使う");
    }

    #[tokio::test]
    async fn test_translate_propagates_generation_failure() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_, _| Err(KoyuError::Generation("unavailable".to_string())));

        let translator = ProtectedTranslator::new(Arc::new(generator));
        assert!(translator.translate("text", Language::German).await.is_err());
    }
}
