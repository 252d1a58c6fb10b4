use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::crop::decode_upload;
use crate::error::PipelineError;
use crate::ocr::Recognizer;

use super::machine::{Command, Event, Pipeline};
use super::state::{PipelineState, Snapshot};
use super::Submitter;

/// Owns the [`Pipeline`] on a dedicated task. Events are applied strictly one
/// at a time; background jobs report back through the same queue.
pub struct Controller {
    pipeline: Pipeline,
    recognizer: Arc<dyn Recognizer>,
    submitter: Arc<dyn Submitter>,
    languages: Vec<String>,
    events: mpsc::WeakUnboundedSender<Event>,
    state: watch::Sender<Snapshot>,
}

#[derive(Clone)]
pub struct ControllerHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<Snapshot>,
}

impl Controller {
    /// Starts the controller task. It stops once every handle is dropped and
    /// no background job is still running.
    pub fn spawn(
        recognizer: Arc<dyn Recognizer>,
        submitter: Arc<dyn Submitter>,
        languages: Vec<String>,
    ) -> ControllerHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pipeline = Pipeline::new();
        let (state_tx, state_rx) = watch::channel(pipeline.snapshot());
        let controller = Controller {
            pipeline,
            recognizer,
            submitter,
            languages,
            events: events_tx.downgrade(),
            state: state_tx,
        };
        tokio::spawn(controller.run(events_rx));
        ControllerHandle {
            events: events_tx,
            state: state_rx,
        }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = events.recv().await {
            if let Some(command) = self.pipeline.apply(event) {
                self.dispatch(command);
            }
            self.state.send_replace(self.pipeline.snapshot());
        }
        debug!("pipeline controller stopped");
    }

    fn dispatch(&self, command: Command) {
        let Some(events) = self.events.upgrade() else {
            debug!("no event sender left; dropping command");
            return;
        };
        match command {
            Command::Decode { ticket, file } => {
                tokio::spawn(async move {
                    let result = tokio::task::spawn_blocking(move || decode_upload(&file))
                        .await
                        .unwrap_or_else(|err| {
                            Err(PipelineError::InvalidFileType(format!(
                                "error reading file: {}",
                                err
                            )))
                        });
                    let _ = events.send(Event::Decoded { ticket, result });
                });
            }
            Command::Recognize { ticket, image } => {
                let recognition = self.recognizer.recognize(image, &self.languages);
                tokio::spawn(async move {
                    let result = recognition
                        .await
                        .map_err(|err| classify(err, PipelineError::Ocr));
                    let _ = events.send(Event::Recognized { ticket, result });
                });
            }
            Command::Submit { ticket, text } => {
                let submission = self.submitter.submit(text);
                tokio::spawn(async move {
                    let result = submission
                        .await
                        .map_err(|err| classify(err, PipelineError::Submission));
                    let _ = events.send(Event::Submitted { ticket, result });
                });
            }
        }
    }
}

/// Keeps a typed error raised by a collaborator, otherwise wraps the message
/// in the failure kind of the stage.
fn classify(err: anyhow::Error, fallback: fn(String) -> PipelineError) -> PipelineError {
    match err.downcast::<PipelineError>() {
        Ok(typed) => typed,
        Err(err) => fallback(format!("{:#}", err)),
    }
}

impl ControllerHandle {
    pub fn send(&self, event: Event) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("pipeline controller has stopped"))
    }

    pub fn state(&self) -> PipelineState {
        self.state.borrow().state.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.state.borrow().clone()
    }

    /// Waits until the published snapshot satisfies `predicate`.
    pub async fn wait_for_snapshot(
        &mut self,
        predicate: impl FnMut(&Snapshot) -> bool,
    ) -> Result<Snapshot> {
        let snapshot = self
            .state
            .wait_for(predicate)
            .await
            .map_err(|_| anyhow!("pipeline controller has stopped"))?;
        Ok(snapshot.clone())
    }

    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&PipelineState) -> bool,
    ) -> Result<PipelineState> {
        let snapshot = self
            .wait_for_snapshot(|snapshot| predicate(&snapshot.state))
            .await?;
        Ok(snapshot.state)
    }

    /// Sends `event` and waits until it has been applied and the work it
    /// started has finished. Refuses to start while something is in flight.
    pub async fn apply(&mut self, event: Event) -> Result<Snapshot> {
        let current = self.snapshot();
        if current.state.is_busy() {
            return Err(anyhow!("pipeline is busy ({})", current.state.name()));
        }
        self.send(event)?;
        self.wait_for_snapshot(|snapshot| {
            snapshot.revision > current.revision && !snapshot.state.is_busy()
        })
        .await
    }

    /// Waits until nothing is in flight.
    pub async fn settled(&mut self) -> Result<PipelineState> {
        self.wait_for(|state| !state.is_busy()).await
    }
}
