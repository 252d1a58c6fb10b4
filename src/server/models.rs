use serde::{Deserialize, Serialize};

use crate::geometry::{CropRect, Size};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LoginResponse {
    pub(crate) success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChatRequest {
    pub(crate) text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ChatResponse {
    pub(crate) response: String,
}

/// An image plus the crop the user drew over it, in display coordinates.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RecognizeRequest {
    pub(crate) image_base64: String,
    #[serde(default)]
    pub(crate) mime: Option<String>,
    #[serde(default)]
    pub(crate) crop: Option<CropRect>,
    #[serde(default)]
    pub(crate) display: Option<Size>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RecognizeResponse {
    pub(crate) text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
