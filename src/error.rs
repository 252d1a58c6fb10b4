use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFileType,
    Extraction,
    Ocr,
    Submission,
    Unauthorized,
}

/// Failure surfaced by the pipeline. Every variant carries the message shown
/// to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("{0}")]
    InvalidFileType(String),
    #[error("{0}")]
    Extraction(String),
    #[error("error performing OCR: {0}")]
    Ocr(String),
    #[error("error solving riddle: {0}")]
    Submission(String),
    #[error("{0}")]
    Unauthorized(String),
}

impl PipelineError {
    pub fn invalid_file_type() -> Self {
        PipelineError::InvalidFileType("please upload an image file".to_string())
    }

    pub fn image_not_ready() -> Self {
        PipelineError::Extraction("no image data available".to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidFileType(_) => ErrorKind::InvalidFileType,
            PipelineError::Extraction(_) => ErrorKind::Extraction,
            PipelineError::Ocr(_) => ErrorKind::Ocr,
            PipelineError::Submission(_) => ErrorKind::Submission,
            PipelineError::Unauthorized(_) => ErrorKind::Unauthorized,
        }
    }

    /// Whether the last-good pipeline state is still usable for a retry.
    /// A rejected upload or a missing credential leaves nothing to retry with.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PipelineError::InvalidFileType(_) | PipelineError::Unauthorized(_)
        )
    }
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_upload_and_auth_failures_are_terminal() {
        assert!(!PipelineError::invalid_file_type().is_retryable());
        assert!(!PipelineError::Unauthorized("login required".into()).is_retryable());
        assert!(PipelineError::image_not_ready().is_retryable());
        assert!(PipelineError::Ocr("engine crashed".into()).is_retryable());
        assert!(PipelineError::Submission("timeout".into()).is_retryable());
    }

    #[test]
    fn serializes_kind_and_message() {
        let value = serde_json::to_value(PipelineError::Ocr("tesseract failed".into())).unwrap();
        insta::assert_json_snapshot!(value, @r#"
        {
          "kind": "ocr",
          "message": "error performing OCR: tesseract failed"
        }
        "#);
    }
}
