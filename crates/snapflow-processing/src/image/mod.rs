//! Image surface operations: bounded resize and lossy encoding.

pub mod encoder;
pub mod resize;

pub use encoder::{ImageEncoder, OutputFormat};
pub use resize::ImageResize;
