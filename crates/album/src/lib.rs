//! Album page compositor.
//!
//! Loads a keyed set of generated images, lays them out as rotated
//! polaroid frames on a fixed-size page, and encodes the page as JPEG.
//! Geometry comes from [`atelier_core::album`]; this crate owns loading
//! and rasterisation.

pub mod canvas;
pub mod compositor;
pub mod encode;
pub mod error;
pub mod loader;
pub mod text;

pub use compositor::{AlbumCompositor, AlbumConfig};
pub use error::AlbumError;
pub use loader::{ImageLoader, ImageSource};
