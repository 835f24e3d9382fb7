//! Core domain models
//!
//! This module defines the jobs, steps, runner selection rules and
//! execution state the engine works with.

pub mod config;
pub mod context;
pub mod job;
pub mod selector;
pub mod state;
pub mod step;

pub use context::*;
pub use job::*;
pub use selector::*;
pub use state::*;
pub use step::*;
