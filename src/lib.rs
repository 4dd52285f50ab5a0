//! # nutrivisual
//!
//! Analyse diet plans with Vision Language Models (VLMs) and chart their
//! food-category composition.
//!
//! A diet plan arrives as a PDF, a Word document or a photo. The first page
//! is turned into an image and described by a VLM, which is asked to list the
//! plan's food categories as `Category - NN%` lines. Those lines are parsed
//! into a [`CompositionMap`], drawn as a pie chart, and paired with a fixed
//! recommendation for the user's health [`Condition`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (path / URL / bytes)
//!  │
//!  ├─ 1. Detect   file kind from the extension (pdf, doc, docx, jpg, png)
//!  ├─ 2. Load     rasterise / decode into page images (spawn_blocking)
//!  ├─ 3. Encode   PNG → base64 ImageData
//!  ├─ 4. VLM      one call with timeout + retry/backoff
//!  ├─ 5. Clean    strip fences, line endings, invisible characters
//!  ├─ 6. Extract  `Label - NN%` lines → CompositionMap
//!  └─ 7. Output   AnalysisResult (+ pie chart, recommendation, notices)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nutrivisual::{AnalysisConfig, Analyzer, Condition, Credentials};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::default();
//!     let credentials = Credentials::from_env(&config.provider_name)?;
//!     let analyzer = Analyzer::from_config(config, &credentials)?;
//!
//!     let result = analyzer.analyze_input("meal-plan.pdf", Condition::Diabetes).await?;
//!     for entry in result.composition.iter() {
//!         println!("{} - {}%", entry.label, entry.percentage);
//!     }
//!     println!("{}", result.recommendation);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `nutrivisual` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! nutrivisual = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod chart;
pub mod composition;
pub mod conditions;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::Analyzer;
pub use chart::{palette_color, render_pie_chart, write_pie_chart};
pub use composition::{extract, ChartSlice, CompositionEntry, CompositionMap};
pub use conditions::{recommendation_for, Condition, ConditionProfile};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, Credentials};
pub use error::AnalysisError;
pub use output::{AnalysisResult, AnalysisStats, Notice};
pub use pipeline::generate::{Generation, LlmTextGenerator, TextGenerator};
pub use pipeline::load::{DocumentLoader, FileKind, LoadedDocument, PageImage, StandardLoader};
pub use progress::{AnalysisProgressCallback, AnalysisStage, NoopProgressCallback, ProgressCallback};
