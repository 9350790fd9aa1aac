//! Mock QR encoder for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::qr::{QrEncoder, QrError};

/// Records every payload and returns fixed bytes instead of rendering.
#[derive(Debug, Default)]
pub struct MockQrEncoder {
    encoded: Mutex<Vec<String>>,
    fail_next: AtomicBool,
}

impl MockQrEncoder {
    /// Returned for every successful encode. Starts with the PNG signature.
    pub const PNG_BYTES: &'static [u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00];

    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call fail with `QrError::Encode`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Payloads encoded so far, in call order.
    pub fn encoded(&self) -> Vec<String> {
        self.encoded.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl QrEncoder for MockQrEncoder {
    fn encode_png(&self, data: &str) -> Result<Vec<u8>, QrError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(QrError::Encode("mock failure".to_string()));
        }
        if let Ok(mut encoded) = self.encoded.lock() {
            encoded.push(data.to_string());
        }
        Ok(Self::PNG_BYTES.to_vec())
    }
}
