//! Legenda - Batch Subtitle Translation
//!
//! Translates SRT subtitles through an LLM in resumable batches, with
//! closed-caption cleanup and a persisted editing session.

pub mod clean;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod orchestrator;
pub mod quality;
pub mod retry;
pub mod session;
pub mod subtitle;
pub mod translate;
pub mod workflow;
