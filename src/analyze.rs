//! Request orchestration: one upload in, one [`AnalysisResult`] out.
//!
//! [`Analyzer`] owns the configuration plus the two swappable seams, the
//! [`DocumentLoader`] and the [`TextGenerator`]. Each call to
//! [`Analyzer::run_analysis`] is an independent request walking
//! `Idle → FileSelected → Loaded → Generated → Parsed → Done`; any error
//! ends it in `Failed` and is returned to the caller, who may simply submit
//! again. Nothing is shared between requests except the read-only config.

use crate::composition::{self, CompositionMap};
use crate::conditions::Condition;
use crate::config::{AnalysisConfig, Credentials};
use crate::error::AnalysisError;
use crate::output::{AnalysisResult, AnalysisStats, Notice};
use crate::pipeline::generate::{LlmTextGenerator, TextGenerator};
use crate::pipeline::input;
use crate::pipeline::load::{DocumentLoader, FileKind, PageImage, StandardLoader};
use crate::pipeline::postprocess;
use crate::progress::{AnalysisStage, StageTracker};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs diet-plan analyses.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
    loader: Arc<dyn DocumentLoader>,
    generator: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    /// Assemble an analyzer from explicit parts (used by tests and embedders
    /// with their own backends).
    pub fn new(
        config: AnalysisConfig,
        loader: Arc<dyn DocumentLoader>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config,
            loader,
            generator,
        }
    }

    /// The standard analyzer: pdfium/image/zip loading and an
    /// `edgequake-llm` provider.
    pub fn from_config(
        config: AnalysisConfig,
        credentials: &Credentials,
    ) -> Result<Self, AnalysisError> {
        let generator = LlmTextGenerator::from_config(&config, credentials)?;
        let loader = StandardLoader::new(&config);
        Ok(Self::new(config, Arc::new(loader), Arc::new(generator)))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse an uploaded document for the given health condition.
    ///
    /// # Arguments
    /// * `bytes`     — the file's contents
    /// * `file_name` — the upload's name; its extension decides the file kind
    /// * `condition` — selects the prompt focus and the recommendation
    ///
    /// # Returns
    /// `Ok` whenever the model answered, even if nothing could be parsed
    /// (check [`AnalysisResult::notices`] for [`Notice::EmptyComposition`]).
    ///
    /// # Errors
    /// * [`AnalysisError::UnsupportedFormat`] before any decoding work
    /// * [`AnalysisError::DocumentDecode`] / [`AnalysisError::NoPreviewAvailable`]
    ///   when the document yields nothing to analyse
    /// * [`AnalysisError::GenerationFailure`] when every VLM attempt failed
    pub async fn run_analysis(
        &self,
        bytes: &[u8],
        file_name: &str,
        condition: Condition,
    ) -> Result<AnalysisResult, AnalysisError> {
        let mut tracker = StageTracker::new(self.config.progress_callback.as_ref());
        match self.run_stages(&mut tracker, bytes, file_name, condition).await {
            Ok(result) => {
                tracker.advance(AnalysisStage::Done);
                Ok(result)
            }
            Err(e) => {
                warn!("Analysis of '{}' failed after stage '{}': {}", file_name, tracker.stage(), e);
                tracker.advance(AnalysisStage::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Synchronous wrapper around [`Analyzer::run_analysis`].
    ///
    /// Creates a temporary tokio runtime internally. Must not be called from
    /// inside an existing runtime.
    pub fn run_analysis_sync(
        &self,
        bytes: &[u8],
        file_name: &str,
        condition: Condition,
    ) -> Result<AnalysisResult, AnalysisError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.run_analysis(bytes, file_name, condition))
    }

    /// Read a local path or download a URL, then analyse it.
    pub async fn analyze_input(
        &self,
        input_str: &str,
        condition: Condition,
    ) -> Result<AnalysisResult, AnalysisError> {
        let resolved =
            match input::resolve_input(input_str, self.config.download_timeout_secs).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    let mut tracker = StageTracker::new(self.config.progress_callback.as_ref());
                    tracker.advance(AnalysisStage::Failed(e.to_string()));
                    return Err(e);
                }
            };
        self.run_analysis(&resolved.bytes, &resolved.file_name, condition)
            .await
    }

    async fn run_stages(
        &self,
        tracker: &mut StageTracker<'_>,
        bytes: &[u8],
        file_name: &str,
        condition: Condition,
    ) -> Result<AnalysisResult, AnalysisError> {
        let start = Instant::now();

        // ── Step 1: Accept the file ──────────────────────────────────────────
        let kind = FileKind::from_file_name(file_name)?;
        info!(
            "Analysing '{}' ({}, {} bytes) for {}",
            file_name,
            kind,
            bytes.len(),
            condition
        );
        tracker.advance(AnalysisStage::FileSelected);

        // ── Step 2: Decode into pages ────────────────────────────────────────
        let (page, pages_loaded) = self.load_first_page(bytes, kind).await?;
        let mut notices = Vec::new();
        if page.is_blank() {
            return Err(AnalysisError::NoPreviewAvailable {
                file_name: file_name.to_string(),
            });
        }
        if !page.is_visual() {
            info!("'{}' has no preview image; analysing its text", file_name);
            notices.push(Notice::NoPreviewAvailable);
        }
        tracker.advance(AnalysisStage::Loaded);

        // ── Step 3: Describe the page ────────────────────────────────────────
        let prompt = match self.config.prompt_override {
            Some(ref custom) => custom.clone(),
            None => condition.profile().analysis_prompt(),
        };
        let generation = self.generator.generate(&page, &prompt).await?;
        debug!(
            "Generation returned {} chars after {} attempt(s)",
            generation.text.len(),
            generation.attempts
        );
        tracker.advance(AnalysisStage::Generated);

        // ── Step 4: Parse the composition ────────────────────────────────────
        let cleaned_text = postprocess::clean_response(&generation.text);
        let composition: CompositionMap = composition::extract(&cleaned_text);
        if composition.is_empty() {
            info!("No 'Label - NN%' lines found in the analysis");
            notices.push(Notice::EmptyComposition);
        } else {
            info!("Parsed {} categories", composition.len());
        }
        tracker.advance(AnalysisStage::Parsed);

        let profile = condition.profile();
        Ok(AnalysisResult {
            file_name: file_name.to_string(),
            file_kind: kind,
            condition,
            condition_name: profile.name.to_string(),
            raw_text: generation.text,
            cleaned_text,
            composition,
            recommendation: profile.recommendation.to_string(),
            notices,
            stats: AnalysisStats {
                pages_loaded,
                page_width: page.width,
                page_height: page.height,
                input_tokens: generation.input_tokens,
                output_tokens: generation.output_tokens,
                attempts: generation.attempts,
                duration_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Decode only the first page, on a blocking thread. Also returns the
    /// document's page count.
    async fn load_first_page(
        &self,
        bytes: &[u8],
        kind: FileKind,
    ) -> Result<(PageImage, usize), AnalysisError> {
        let loader = Arc::clone(&self.loader);
        let owned = bytes.to_vec();
        let document = tokio::task::spawn_blocking(move || loader.load(&owned, kind, 1))
            .await
            .map_err(|e| AnalysisError::Internal(format!("loader task failed: {e}")))??;

        let pages_loaded = document.page_count;
        debug!(
            "Document has {} page(s), {} decoded",
            pages_loaded,
            document.pages.len()
        );
        let page = document
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| AnalysisError::DocumentDecode {
                kind: kind.to_string(),
                detail: "the document has no pages".to_string(),
            })?;
        Ok((page, pages_loaded))
    }
}
