use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};

use super::auth::is_authenticated;
use super::state::{ServerError, ServerState};

const LOGIN_TEMPLATE: &str = include_str!("templates/login.html.tera");
const APP_TEMPLATE: &str = include_str!("templates/app.html.tera");
const PAGE_TITLE: &str = "Riddle Solver";

pub(crate) async fn index(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Html<String>, ServerError> {
    let page = if is_authenticated(&headers, state.secret.as_deref()) {
        render_app_page(&state.settings.ocr_languages)?
    } else {
        render_login_page()?
    };
    Ok(Html(page))
}

fn render_login_page() -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("title", PAGE_TITLE);
    Tera::one_off(LOGIN_TEMPLATE, &context, true).with_context(|| "failed to render login page")
}

fn render_app_page(languages: &[String]) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("title", PAGE_TITLE);
    context.insert("languages", &languages.join("+"));
    Tera::one_off(APP_TEMPLATE, &context, true).with_context(|| "failed to render app page")
}
