use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::artifacts::ArtifactWriter;
use crate::config::Config;
use crate::detect::GenerativeDetector;
use crate::error::{KoyuError, Result};
use crate::language::Language;
use crate::llm::{check_model_availability, LlmClient, TextGenerator};
use crate::matcher::{strip_placeholders, TermMatcher};
use crate::terminology::TermTable;
use crate::translate::ProtectedTranslator;

/// Summary of one completed per-language pipeline
#[derive(Debug, Clone)]
pub struct LanguageReport {
    pub language: Language,
    /// Occurrences found by the pattern pass over the raw transcript
    pub pattern_occurrences: usize,
    /// Terms reported by the generative pass after canonicalization
    pub detected_terms: usize,
    pub transcript_path: PathBuf,
}

/// Drives the transcript pipeline end to end: pattern pass, generative
/// detection, canonicalization, protected translation, placeholder strip.
pub struct Workflow {
    config: Config,
    table: Arc<TermTable>,
    generator: Arc<dyn TextGenerator>,
}

impl Workflow {
    /// Create a workflow from configuration, loading the terminology
    /// table from disk and connecting the LLM client
    pub fn new(config: Config) -> Result<Self> {
        let table = Arc::new(TermTable::load_dir(&config.terminology.dir)?);
        info!(
            "Loaded terminology table with {} entries from {}",
            table.len(),
            config.terminology.dir
        );
        let generator: Arc<dyn TextGenerator> = Arc::new(LlmClient::new(config.llm.clone()));
        Ok(Self {
            config,
            table,
            generator,
        })
    }

    /// Create a workflow from preloaded parts
    pub fn with_components(
        config: Config,
        table: Arc<TermTable>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            table,
            generator,
        }
    }

    /// Verify the configured models are available on the endpoint.
    /// A missing primary model is fatal; a missing fallback only warns.
    pub async fn check_models(&self) -> Result<()> {
        check_model_availability(&self.config.llm.endpoint, &self.config.llm.model).await?;
        if let Err(e) =
            check_model_availability(&self.config.llm.endpoint, &self.config.llm.fallback_model)
                .await
        {
            warn!("Fallback model unavailable: {}", e);
        }
        Ok(())
    }

    /// Process a single transcript file into the given target languages
    pub async fn process_file(
        &self,
        input: &Path,
        languages: &[Language],
        output_dir: Option<&Path>,
    ) -> Result<Vec<LanguageReport>> {
        info!("Processing transcript: {}", input.display());

        if !input.exists() {
            return Err(KoyuError::FileNotFound(input.display().to_string()));
        }

        let text = fs::read_to_string(input).await?;
        let output_dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from(&self.config.output.dir),
        };

        self.process_text(&text, languages, &output_dir).await
    }

    /// Run one pipeline per target language concurrently. Languages are
    /// independent: a failure in one does not stop the others, and the
    /// call succeeds as long as at least one language completes.
    pub async fn process_text(
        &self,
        text: &str,
        languages: &[Language],
        output_dir: &Path,
    ) -> Result<Vec<LanguageReport>> {
        let writer = Arc::new(ArtifactWriter::new(output_dir).await?);

        let mut handles = Vec::new();
        for language in languages.iter().copied() {
            let table = Arc::clone(&self.table);
            let generator = Arc::clone(&self.generator);
            let writer = Arc::clone(&writer);
            let text = text.to_string();
            handles.push(tokio::spawn(async move {
                let outcome = process_language(table, generator, writer, &text, language).await;
                (language, outcome)
            }));
        }

        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for handle in handles {
            match handle.await {
                Ok((language, Ok(report))) => {
                    info!(
                        "Completed {} pipeline: {} pattern occurrences, {} detected terms",
                        language.code(),
                        report.pattern_occurrences,
                        report.detected_terms
                    );
                    reports.push(report);
                }
                Ok((language, Err(e))) => {
                    warn!("Pipeline for {} failed: {}", language.code(), e);
                    failures.push(format!("{}: {}", language.code(), e));
                }
                Err(e) => {
                    warn!("Language task aborted: {}", e);
                    failures.push(format!("task aborted: {}", e));
                }
            }
        }

        if reports.is_empty() {
            return Err(KoyuError::Translation(format!(
                "All language pipelines failed: {}",
                failures.join("; ")
            )));
        }

        reports.sort_by_key(|r| r.language.index());
        Ok(reports)
    }

    /// Process every .txt transcript under a directory tree, writing
    /// each file's artifacts into a subdirectory named after its stem
    pub async fn process_directory(
        &self,
        input_dir: &Path,
        languages: &[Language],
        output_dir: Option<&Path>,
    ) -> Result<()> {
        if !input_dir.is_dir() {
            return Err(KoyuError::Config(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        let output_root = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => PathBuf::from(&self.config.output.dir),
        };

        let mut transcripts = Vec::new();
        for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() {
                if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    if ext.eq_ignore_ascii_case("txt") {
                        transcripts.push(path.to_path_buf());
                    }
                }
            }
        }
        transcripts.sort();

        info!(
            "Found {} transcript files in {}",
            transcripts.len(),
            input_dir.display()
        );

        let progress = ProgressBar::new(transcripts.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );

        for path in &transcripts {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                progress.set_message(name.to_string());
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("transcript");
            let per_file_dir = output_root.join(stem);

            match self.process_file(path, languages, Some(&per_file_dir)).await {
                Ok(reports) => {
                    info!(
                        "Successfully processed {} ({} languages)",
                        path.display(),
                        reports.len()
                    );
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                }
            }
            progress.inc(1);
        }
        progress.finish_with_message("Batch complete");

        Ok(())
    }
}

/// The five pipeline stages for one target language. Detection artifacts
/// are persisted before translation starts, so a translation failure
/// never loses the detection results.
async fn process_language(
    table: Arc<TermTable>,
    generator: Arc<dyn TextGenerator>,
    writer: Arc<ArtifactWriter>,
    text: &str,
    language: Language,
) -> Result<LanguageReport> {
    let matcher = TermMatcher::new(&table, language)?;

    // Stage 1: deterministic pattern pass over the raw transcript. Its
    // output feeds the audit log; the generative pass sees the raw text.
    let pass1 = matcher.apply(text);
    writer
        .write_term_log(language, &pass1.occurrences, pass1.elapsed)
        .await?;
    info!(
        "{}: pattern pass found {} occurrences",
        language.code(),
        pass1.occurrences.len()
    );

    if table.is_empty() {
        // No terminology to protect or standardize: the transcript
        // passes through unchanged.
        writer
            .write_detection_log(language, &[], Duration::ZERO)
            .await?;
        writer.write_descriptions(language, &[]).await?;
        let transcript_path = writer.write_transcript(language, text).await?;
        return Ok(LanguageReport {
            language,
            pattern_occurrences: 0,
            detected_terms: 0,
            transcript_path,
        });
    }

    // Stage 2: generative detection over the raw transcript
    let detector = GenerativeDetector::new(Arc::clone(&table), Arc::clone(&generator), language);
    let detection = detector.detect(text).await?;
    writer
        .write_detection_log(language, &detection.terms, detection.elapsed)
        .await?;
    let rows = table.description_rows(&detection.terms, language);
    writer.write_descriptions(language, &rows).await?;
    info!(
        "{}: generative pass reported {} terms",
        language.code(),
        detection.terms.len()
    );

    // Stage 3: second pattern pass canonicalizes the detector's rewrite
    // and inserts the placeholder protection
    let pass2 = matcher.apply(&detection.transcript);

    // Stage 4: protected translation
    let translator = ProtectedTranslator::new(Arc::clone(&generator));
    let translated = translator.translate(&pass2.text, language).await?;

    // Stage 5: strip the placeholder braces from the final transcript
    let final_text = strip_placeholders(&translated);
    let transcript_path = writer.write_transcript(language, &final_text).await?;

    Ok(LanguageReport {
        language,
        pattern_occurrences: pass1.occurrences.len(),
        detected_terms: detection.terms.len(),
        transcript_path,
    })
}
