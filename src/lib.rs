pub mod antibot;
pub mod core;
pub mod embed;
pub mod extract;
pub mod fetch;
pub mod gap;
pub mod job;
pub mod orchestrator;
pub mod phrase;
pub mod proxy;
pub mod score;
pub mod serp;

pub use core::types;
pub use core::{AppState, Result, SeoError};
pub use orchestrator::Orchestrator;
