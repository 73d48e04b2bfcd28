//! HTTP server and orchestration engine for the selfie generation
//! storefront.
//!
//! Composes the admission gate (promo codes / payments), the generation
//! ledger, the workflow template, and the ComfyUI backend client into a
//! JSON API with a token-gated admin surface.

pub mod backend_url;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod sessions;
pub mod state;
