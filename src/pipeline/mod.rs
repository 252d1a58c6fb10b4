//! Upload, crop, OCR and submission sequencing.
//!
//! [`Pipeline`] is the synchronous state machine: every user action and every
//! finished background job enters through [`Pipeline::apply`]. [`Controller`]
//! drives it from a single task, runs the returned [`Command`]s and feeds
//! their results back in as events.

mod controller;
mod machine;
mod state;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

pub use controller::{Controller, ControllerHandle};
pub use machine::{Command, Event, Pipeline, Ticket};
pub use state::{PipelineState, Snapshot};

pub type SubmitFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// Hands the edited riddle text to the language model and yields its answer.
pub trait Submitter: Send + Sync {
    fn submit(&self, text: String) -> SubmitFuture;
}
