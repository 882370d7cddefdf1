//! Pure domain types, constants, and validation for the creative photo
//! studio.
//!
//! Nothing in this crate performs I/O. The orchestration engine
//! (`atelier-pipeline`) and the album renderer (`atelier-album`) build on
//! the types and layout math defined here.

pub mod album;
pub mod error;
pub mod mode;
pub mod naming;
pub mod types;
