//! Domain logic for the GenSelfie generation engine.
//!
//! Pure, I/O-free building blocks: workflow template manipulation,
//! promo-code usability rules, preset validation, and the shared error
//! and type aliases used across the workspace.

pub mod codes;
pub mod error;
pub mod preset;
pub mod types;
pub mod workflow;
