use anyhow::{Context, Result, anyhow};
use tera::{Context as TeraContext, Tera};
use tracing::info;

use crate::pipeline::{SubmitFuture, Submitter};
use crate::providers::{Provider, ProviderUsage};

/// Answer the model gives when it cannot name anyone. Passed through to the
/// user verbatim.
pub const UNSOLVABLE_TOKEN: &str = "UNSOLVABLE";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("templates/system_prompt.tera");

#[derive(Debug, Clone)]
pub struct Solver<P: Provider> {
    provider: P,
}

#[derive(Debug, Clone)]
pub struct SolveOutput {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

pub fn render_system_prompt() -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("sentinel", UNSOLVABLE_TOKEN);
    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .map(|prompt| prompt.trim_end().to_string())
        .with_context(|| "failed to render system prompt")
}

impl<P: Provider> Solver<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub async fn solve(&self, riddle: &str) -> Result<SolveOutput> {
        let riddle = riddle.trim();
        if riddle.is_empty() {
            return Err(anyhow!("riddle text is empty"));
        }
        let response = self
            .provider
            .clone()
            .append_system_input(render_system_prompt()?)
            .append_user_input(riddle.to_string())
            .complete()
            .await?;
        info!(
            model = response.model.as_deref().unwrap_or("unknown"),
            "riddle answered"
        );
        Ok(SolveOutput {
            text: response.text,
            model: response.model,
            usage: response.usage,
        })
    }
}

/// Submits straight to the model, without going through the HTTP server.
#[derive(Debug, Clone)]
pub struct SolverSubmitter<P: Provider> {
    solver: Solver<P>,
}

impl<P: Provider + 'static> SolverSubmitter<P> {
    pub fn new(solver: Solver<P>) -> Self {
        Self { solver }
    }
}

impl<P: Provider + 'static> Submitter for SolverSubmitter<P> {
    fn submit(&self, text: String) -> SubmitFuture {
        let solver = self.solver.clone();
        Box::pin(async move { Ok(solver.solve(&text).await?.text) })
    }
}
