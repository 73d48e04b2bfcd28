//! ComfyUI HTTP client and job resolution.
//!
//! Wraps the backend's four primitives (upload asset, submit job, query
//! queue, query history) and builds the polling state machine that turns
//! a submitted job id into a terminal state plus output locator.

pub mod api;
pub mod resolver;

pub use api::{ComfyUIApi, ComfyUIApiError, GenerationBackend, QueueSnapshot};
pub use resolver::{JobCheck, JobResolver, OutputKind, OutputLocator, Resolution};
