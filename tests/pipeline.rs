//! Integration tests for the analysis pipeline.
//!
//! The orchestrator is exercised end to end with a fake loader and a fake
//! text generator, so these run offline. The live test at the bottom calls
//! a real provider and is gated behind `E2E_ENABLED`.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use image::DynamicImage;
use nutrivisual::{
    AnalysisConfig, AnalysisError, AnalysisProgressCallback, AnalysisStage, Analyzer, Condition,
    Credentials, DocumentLoader, FileKind, Generation, LoadedDocument, Notice, PageImage,
    TextGenerator,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const REFERENCE_TEXT: &str = "Protein-rich foods - 40%\nCarbohydrates - 30%\nVegetables - 20%\nFruits - 10%";

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeLoader {
    pages: Vec<PageImage>,
    calls: AtomicUsize,
    requested_pages: AtomicUsize,
}

impl FakeLoader {
    fn new(pages: Vec<PageImage>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
            requested_pages: AtomicUsize::new(0),
        })
    }

    fn visual() -> Arc<Self> {
        Self::new(vec![PageImage::raster(0, DynamicImage::new_rgb8(64, 48))])
    }
}

impl DocumentLoader for FakeLoader {
    fn load(
        &self,
        _bytes: &[u8],
        _kind: FileKind,
        max_pages: usize,
    ) -> Result<LoadedDocument, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested_pages.store(max_pages, Ordering::SeqCst);
        Ok(LoadedDocument {
            page_count: self.pages.len(),
            pages: self.pages.iter().take(max_pages).cloned().collect(),
        })
    }
}

struct FakeGenerator {
    reply: Result<String, String>,
    calls: AtomicUsize,
    seen_prompt: Mutex<Option<String>>,
    seen_text: Mutex<Option<String>>,
}

impl FakeGenerator {
    fn replying(text: &str) -> Arc<Self> {
        Self::with(Ok(text.to_string()))
    }

    fn failing(cause: &str) -> Arc<Self> {
        Self::with(Err(cause.to_string()))
    }

    fn with(reply: Result<String, String>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            seen_prompt: Mutex::new(None),
            seen_text: Mutex::new(None),
        })
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, page: &PageImage, prompt: &str) -> Result<Generation, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.seen_text.lock().unwrap() = page.text().map(str::to_string);
        match &self.reply {
            Ok(text) => Ok(Generation {
                text: text.clone(),
                input_tokens: 100,
                output_tokens: 20,
                attempts: 1,
            }),
            Err(cause) => Err(AnalysisError::GenerationFailure {
                attempts: 3,
                cause: cause.clone(),
            }),
        }
    }
}

#[derive(Default)]
struct StageRecorder {
    stages: Mutex<Vec<AnalysisStage>>,
}

impl AnalysisProgressCallback for StageRecorder {
    fn on_stage(&self, stage: &AnalysisStage) {
        self.stages.lock().unwrap().push(stage.clone());
    }
}

fn analyzer(loader: Arc<FakeLoader>, generator: Arc<FakeGenerator>) -> Analyzer {
    Analyzer::new(AnalysisConfig::default(), loader, generator)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_extension_is_rejected_before_loading() {
    let loader = FakeLoader::visual();
    let generator = FakeGenerator::replying(REFERENCE_TEXT);
    let a = analyzer(loader.clone(), generator.clone());

    let err = a
        .run_analysis(b"whatever", "diet.xyz", Condition::General)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::UnsupportedFormat { ref extension } if extension == "xyz"));
    assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reference_answer_produces_four_categories() {
    let recorder = Arc::new(StageRecorder::default());
    let config = AnalysisConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn AnalysisProgressCallback>)
        .build()
        .unwrap();
    let a = Analyzer::new(
        config,
        FakeLoader::visual(),
        FakeGenerator::replying(REFERENCE_TEXT),
    );

    let result = a
        .run_analysis(b"png bytes", "plan.PNG", Condition::General)
        .await
        .unwrap();

    assert_eq!(result.file_kind, FileKind::Image);
    assert_eq!(result.composition.len(), 4);
    assert_eq!(result.composition.get("Protein-rich foods"), Some(40.0));
    assert_eq!(result.composition.get("fruits"), Some(10.0));
    assert!(result.notices.is_empty());
    assert_eq!((result.stats.page_width, result.stats.page_height), (64, 48));
    assert_eq!(result.stats.input_tokens, 100);

    use AnalysisStage::*;
    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![FileSelected, Loaded, Generated, Parsed, Done]
    );
}

#[tokio::test]
async fn model_output_is_cleaned_before_parsing() {
    let reply = "```\r\nHere is the breakdown:\r\n\r\n- **Grains** - 50%\r\n- Dairy - 50%\r\n```";
    let a = analyzer(FakeLoader::visual(), FakeGenerator::replying(reply));

    let result = a
        .run_analysis(b"", "plan.jpg", Condition::General)
        .await
        .unwrap();

    assert_eq!(result.raw_text, reply);
    assert!(!result.cleaned_text.contains("```"));
    assert!(!result.cleaned_text.contains('\r'));
    assert_eq!(result.composition.get("Grains"), Some(50.0));
    assert_eq!(result.composition.get("Dairy"), Some(50.0));
}

#[tokio::test]
async fn empty_answer_is_a_notice_not_an_error() {
    let recorder = Arc::new(StageRecorder::default());
    let config = AnalysisConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn AnalysisProgressCallback>)
        .build()
        .unwrap();
    let a = Analyzer::new(config, FakeLoader::visual(), FakeGenerator::replying(""));

    let result = a
        .run_analysis(b"", "plan.pdf", Condition::Diabetes)
        .await
        .unwrap();

    assert!(result.is_empty_composition());
    assert!(result.has_notice(Notice::EmptyComposition));
    assert_eq!(
        recorder.stages.lock().unwrap().last(),
        Some(&AnalysisStage::Done)
    );
}

#[tokio::test]
async fn prose_without_percentages_is_an_empty_composition() {
    let a = analyzer(
        FakeLoader::visual(),
        FakeGenerator::replying("This plan looks balanced and varied."),
    );
    let result = a
        .run_analysis(b"", "plan.png", Condition::General)
        .await
        .unwrap();
    assert!(result.has_notice(Notice::EmptyComposition));
    assert_eq!(result.cleaned_text, "This plan looks balanced and varied.");
}

#[tokio::test]
async fn generator_failure_is_returned_and_ends_in_failed() {
    let recorder = Arc::new(StageRecorder::default());
    let config = AnalysisConfig::builder()
        .progress_callback(recorder.clone() as Arc<dyn AnalysisProgressCallback>)
        .build()
        .unwrap();
    let a = Analyzer::new(
        config,
        FakeLoader::visual(),
        FakeGenerator::failing("quota exceeded"),
    );

    let err = a
        .run_analysis(b"", "plan.png", Condition::General)
        .await
        .unwrap_err();

    match err {
        AnalysisError::GenerationFailure { cause, .. } => assert_eq!(cause, "quota exceeded"),
        other => panic!("expected GenerationFailure, got {other:?}"),
    }
    let stages = recorder.stages.lock().unwrap();
    assert!(matches!(stages.last(), Some(AnalysisStage::Failed(reason)) if reason.contains("quota")));
    assert!(!stages.contains(&AnalysisStage::Generated));
}

#[tokio::test]
async fn text_only_document_is_analysed_with_notice() {
    let loader = FakeLoader::new(vec![PageImage::non_visual("Lunch: rice - 60%, beans - 40%")]);
    let generator = FakeGenerator::replying("Rice - 60%\nBeans - 40%");
    let a = analyzer(loader, generator.clone());

    let result = a
        .run_analysis(b"", "plan.docx", Condition::Vegetarian)
        .await
        .unwrap();

    assert!(result.has_notice(Notice::NoPreviewAvailable));
    assert_eq!((result.stats.page_width, result.stats.page_height), (0, 0));
    assert_eq!(result.composition.len(), 2);
    assert_eq!(
        generator.seen_text.lock().unwrap().as_deref(),
        Some("Lunch: rice - 60%, beans - 40%")
    );
}

#[tokio::test]
async fn blank_document_has_no_preview() {
    let generator = FakeGenerator::replying(REFERENCE_TEXT);
    let a = analyzer(
        FakeLoader::new(vec![PageImage::non_visual("   ")]),
        generator.clone(),
    );

    let err = a
        .run_analysis(b"", "empty.doc", Condition::General)
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::NoPreviewAvailable { ref file_name } if file_name == "empty.doc"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn loader_with_no_pages_is_a_decode_error() {
    let a = analyzer(FakeLoader::new(vec![]), FakeGenerator::replying(REFERENCE_TEXT));
    let err = a
        .run_analysis(b"", "plan.pdf", Condition::General)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalysisError::DocumentDecode { .. }));
}

#[tokio::test]
async fn only_the_first_page_is_decoded() {
    let pages = (0..3)
        .map(|i| PageImage::raster(i, DynamicImage::new_rgb8(40 + i as u32, 30)))
        .collect();
    let loader = FakeLoader::new(pages);
    let a = analyzer(loader.clone(), FakeGenerator::replying(REFERENCE_TEXT));

    let result = a
        .run_analysis(b"", "week.pdf", Condition::General)
        .await
        .unwrap();

    assert_eq!(loader.requested_pages.load(Ordering::SeqCst), 1);
    assert_eq!(result.stats.pages_loaded, 3);
    assert_eq!((result.stats.page_width, result.stats.page_height), (40, 30));
}

#[tokio::test]
async fn condition_selects_prompt_and_recommendation() {
    let generator = FakeGenerator::replying(REFERENCE_TEXT);
    let a = analyzer(FakeLoader::visual(), generator.clone());

    let result = a
        .run_analysis(b"", "plan.png", Condition::Hypertension)
        .await
        .unwrap();

    let profile = Condition::Hypertension.profile();
    assert_eq!(result.condition, Condition::Hypertension);
    assert_eq!(result.condition_name, profile.name);
    assert_eq!(result.recommendation, profile.recommendation);
    assert_eq!(
        generator.seen_prompt.lock().unwrap().as_deref(),
        Some(profile.analysis_prompt().as_str())
    );
}

#[tokio::test]
async fn prompt_override_replaces_condition_prompt() {
    let generator = FakeGenerator::replying(REFERENCE_TEXT);
    let config = AnalysisConfig::builder()
        .prompt_override("List categories only.")
        .build()
        .unwrap();
    let a = Analyzer::new(config, FakeLoader::visual(), generator.clone());

    let result = a
        .run_analysis(b"", "plan.png", Condition::Diabetes)
        .await
        .unwrap();

    assert_eq!(
        generator.seen_prompt.lock().unwrap().as_deref(),
        Some("List categories only.")
    );
    assert_eq!(
        result.recommendation,
        Condition::Diabetes.profile().recommendation
    );
}

#[tokio::test]
async fn requests_are_independent() {
    let a = analyzer(FakeLoader::visual(), FakeGenerator::replying(REFERENCE_TEXT));
    assert!(a.run_analysis(b"", "bad.txt", Condition::General).await.is_err());
    let ok = a
        .run_analysis(b"", "good.png", Condition::General)
        .await
        .unwrap();
    assert_eq!(ok.composition.len(), 4);
}

#[tokio::test]
async fn analyze_input_reads_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("week.png");
    std::fs::write(&path, b"fake").unwrap();

    let a = analyzer(FakeLoader::visual(), FakeGenerator::replying(REFERENCE_TEXT));
    let result = a
        .analyze_input(path.to_str().unwrap(), Condition::General)
        .await
        .unwrap();
    assert_eq!(result.file_name, "week.png");

    let missing = a
        .analyze_input(dir.path().join("gone.png").to_str().unwrap(), Condition::General)
        .await
        .unwrap_err();
    assert!(matches!(missing, AnalysisError::FileNotFound { .. }));
}

#[test]
fn sync_wrapper_runs_outside_a_runtime() {
    let a = analyzer(FakeLoader::visual(), FakeGenerator::replying(REFERENCE_TEXT));
    let result = a
        .run_analysis_sync(b"", "plan.jpeg", Condition::LowCarb)
        .unwrap();
    assert_eq!(result.composition.len(), 4);
    assert_eq!(result.condition, Condition::LowCarb);
}

#[test]
fn missing_api_key_is_reported_at_startup() {
    let err = Credentials::from_lookup("gemini", |_| None).unwrap_err();
    assert!(matches!(err, AnalysisError::Configuration(_)));
}

// ── Live (gated) ─────────────────────────────────────────────────────────────

/// Calls the configured provider with a real image from `./test_cases/`.
#[tokio::test]
async fn e2e_live_image_analysis() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/meal_plan.png");
    if !path.exists() {
        println!("SKIP — test file not found: {}", path.display());
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let credentials = match Credentials::from_env("gemini") {
        Ok(c) => c,
        Err(e) => {
            println!("SKIP — {e}");
            return;
        }
    };

    let analyzer = Analyzer::from_config(AnalysisConfig::default(), &credentials).unwrap();
    let result = analyzer
        .analyze_input(path.to_str().unwrap(), Condition::General)
        .await
        .unwrap();

    println!("{}", result.cleaned_text);
    assert!(!result.raw_text.trim().is_empty());
}
