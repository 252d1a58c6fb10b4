use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;

pub mod crop;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod settings;
pub mod solver;
#[cfg(test)]
mod test_util;

pub use crop::{SourceImage, UploadFile};
pub use error::{ErrorKind, PipelineError};
pub use geometry::{CropRect, Point, Size};
pub use ocr::{Recognizer, TesseractRecognizer};
pub use pipeline::{Controller, ControllerHandle, Event, PipelineState, Snapshot, Submitter};
pub use providers::{OpenAI, Provider, ProviderUsage};
pub use server::HttpSubmitter;
pub use solver::{Solver, SolverSubmitter};

use gesture::GestureEvent;
use settings::Settings;

/// Environment variable holding the login secret.
pub const PASSWORD_ENV: &str = "PRIVATE_ACCESS_PASSWORD";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub model: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
    /// Submit through a running server instead of calling the model.
    pub remote: Option<String>,
}

/// Collaborators shared by the server, the REPL and one-shot runs.
#[derive(Clone)]
pub struct Services {
    pub settings: Settings,
    pub recognizer: Arc<dyn Recognizer>,
    pub submitter: Arc<dyn Submitter>,
}

impl Services {
    pub fn load(config: &Config) -> Result<Self> {
        let settings_path = config.settings_path.as_deref().map(Path::new);
        let settings = settings::load_settings(settings_path)?;
        let recognizer = Arc::new(TesseractRecognizer::new().with_psm(settings.ocr_psm));
        let submitter: Arc<dyn Submitter> = match config.remote.as_deref() {
            Some(url) => {
                let password = password_from_env()
                    .ok_or_else(|| anyhow!("{} is required with --remote", PASSWORD_ENV))?;
                Arc::new(HttpSubmitter::new(url, password))
            }
            None => {
                let provider = build_provider(config, &settings)?;
                Arc::new(SolverSubmitter::new(Solver::new(provider)))
            }
        };
        Ok(Self {
            settings,
            recognizer,
            submitter,
        })
    }

    pub fn spawn_controller(&self) -> ControllerHandle {
        Controller::spawn(
            self.recognizer.clone(),
            self.submitter.clone(),
            self.settings.ocr_languages.clone(),
        )
    }
}

pub fn build_provider(config: &Config, settings: &Settings) -> Result<OpenAI> {
    let key = providers::resolve_key(config.key.as_deref())?;
    let model = config
        .model
        .clone()
        .unwrap_or_else(|| settings.model_name.clone());
    Ok(OpenAI::new(key)
        .with_model(model)
        .with_base_url(settings.model_base_url.clone()))
}

pub fn password_from_env() -> Option<String> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub display: Option<Size>,
    pub crop: Option<CropRect>,
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub text: String,
    pub answer: String,
}

/// Upload, optional crop, recognize and submit, one after the other.
pub async fn run_once(
    handle: &mut ControllerHandle,
    file: UploadFile,
    request: RunRequest,
) -> Result<RunOutput> {
    settle(handle.apply(Event::Upload(file)).await?)?;
    if let Some(display) = request.display {
        handle.apply(Event::Resize(display)).await?;
    }
    if let Some(rect) = request.crop.filter(|rect| !rect.is_empty()) {
        handle.apply(Event::ToggleCrop).await?;
        for gesture in [
            GestureEvent::Begin(Point::new(rect.x, rect.y)),
            GestureEvent::Update(Point::new(rect.right(), rect.bottom())),
            GestureEvent::End,
        ] {
            handle.apply(Event::Pointer(gesture)).await?;
        }
    }

    let text = match settle(handle.apply(Event::Recognize).await?)? {
        PipelineState::Editing(text) => text,
        other => return Err(anyhow!("unexpected state after OCR: {}", other.name())),
    };
    let answer = match settle(handle.apply(Event::Submit).await?)? {
        PipelineState::Done(answer) => answer,
        other => return Err(anyhow!("unexpected state after submit: {}", other.name())),
    };
    Ok(RunOutput { text, answer })
}

fn settle(snapshot: Snapshot) -> Result<PipelineState> {
    match snapshot.state {
        PipelineState::Failed(err) => Err(err).with_context(|| "pipeline failed"),
        state => Ok(state),
    }
}
