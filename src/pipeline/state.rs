use serde::Serialize;

use crate::error::PipelineError;
use crate::geometry::{CropRect, Size};

/// What the user currently sees. Exactly one is live at a time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Uploading,
    Cropping(CropRect),
    Recognizing,
    Editing(String),
    Submitting,
    Done(String),
    Failed(PipelineError),
}

impl PipelineState {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Uploading | PipelineState::Recognizing | PipelineState::Submitting
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Uploading => "uploading",
            PipelineState::Cropping(_) => "cropping",
            PipelineState::Recognizing => "recognizing",
            PipelineState::Editing(_) => "editing",
            PipelineState::Submitting => "submitting",
            PipelineState::Done(_) => "done",
            PipelineState::Failed(_) => "failed",
        }
    }
}

/// State plus the image and crop details a view needs to draw itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Number of events applied so far.
    pub revision: u64,
    pub state: PipelineState,
    pub natural: Option<Size>,
    pub display: Option<Size>,
    pub cropping: bool,
    pub crop: CropRect,
}
