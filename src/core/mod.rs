//! Core domain models
//!
//! This module defines the fundamental data structures that represent
//! provisioning pipelines, stages, their configuration and templates.

pub mod config;
pub mod pipeline;
pub mod stage;
pub mod state;
pub mod template;

pub use pipeline::*;
pub use stage::*;
pub use state::*;
