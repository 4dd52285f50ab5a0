//! Output types for a completed analysis.

use crate::composition::CompositionMap;
use crate::conditions::Condition;
use crate::pipeline::load::FileKind;
use serde::Serialize;

/// Everything one successful request produced.
///
/// "Successful" means the pipeline ran to completion. The composition may
/// still be empty, in which case [`Notice::EmptyComposition`] is attached
/// and there is nothing to chart.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub file_name: String,
    pub file_kind: FileKind,
    pub condition: Condition,
    /// Display name of `condition`, e.g. "High Cholesterol".
    pub condition_name: String,
    /// The model's answer exactly as generated.
    pub raw_text: String,
    /// `raw_text` after clean-up; the composition is parsed from this, and
    /// it is what gets shown to the user.
    pub cleaned_text: String,
    pub composition: CompositionMap,
    pub recommendation: String,
    pub notices: Vec<Notice>,
    pub stats: AnalysisStats,
}

impl AnalysisResult {
    pub fn has_notice(&self, notice: Notice) -> bool {
        self.notices.contains(&notice)
    }

    /// `true` when no category could be parsed; no chart should be drawn.
    pub fn is_empty_composition(&self) -> bool {
        self.composition.is_empty()
    }
}

/// Non-fatal conditions worth telling the user about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// The description held no `Label - NN%` line.
    EmptyComposition,
    /// The document had no image; the analysis ran on its text alone.
    NoPreviewAvailable,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Notice::EmptyComposition => {
                "No composition could be extracted from the analysis. \
The model did not list any 'Category - NN%' lines, so there is no chart."
            }
            Notice::NoPreviewAvailable => {
                "No preview available: the document contains no image, \
so it was analysed from its text only."
            }
        }
    }
}

/// Counters for one request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisStats {
    /// Pages in the uploaded document (only the first is decoded and analysed).
    pub pages_loaded: usize,
    /// Geometry of the analysed page in pixels; 0 × 0 when non-visual.
    pub page_width: u32,
    pub page_height: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Generation attempts used, including the successful one.
    pub attempts: u32,
    pub duration_ms: u64,
}
