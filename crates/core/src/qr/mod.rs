//! QR code rendering for ticket links.

mod png;

pub use png::PngQrEncoder;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrError {
    /// Payload does not fit in a QR code.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    #[error("failed to write image: {0}")]
    Image(String),
}

/// Renders text into a scannable image.
pub trait QrEncoder: Send + Sync {
    /// PNG bytes of a QR code carrying `data`.
    fn encode_png(&self, data: &str) -> Result<Vec<u8>, QrError>;
}
