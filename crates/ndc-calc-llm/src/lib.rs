//! Language-model collaborator for prescription text extraction.
//!
//! This crate turns free-text SIGs and drug descriptions into the
//! structured fields `ndc-calc-core` asks its optional collaborator for,
//! over any chat-style completion backend.

pub mod assistant;
pub mod extraction;
pub mod prompts;

pub use assistant::*;
pub use extraction::*;
pub use prompts::*;
