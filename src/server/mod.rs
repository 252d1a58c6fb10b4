mod auth;
mod chat;
mod client;
mod handlers;
mod models;
mod pages;
mod recognize;
mod state;

pub use client::HttpSubmitter;
pub use handlers::run_server;
