//! Boundary to the remote image-generation service.
//!
//! The orchestration engine only depends on the [`GenerationClient`]
//! trait. [`api::GeminiApi`] is an HTTP implementation against a
//! Gemini-style `generateContent` endpoint.

pub mod api;
pub mod client;
pub mod config;

pub use client::{GenerationClient, GenerationError};
