use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};

use super::{QrEncoder, QrError};
use crate::config::QrConfig;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Grayscale PNG renderer.
///
/// The image is at least `size` pixels wide, with `margin` light modules
/// around the code on every side.
#[derive(Debug, Clone)]
pub struct PngQrEncoder {
    size: u32,
    margin: u32,
}

impl PngQrEncoder {
    pub fn new(size: u32, margin: u32) -> Self {
        Self {
            size: size.max(1),
            margin,
        }
    }

    pub fn from_config(config: &QrConfig) -> Self {
        Self::new(config.size, config.margin)
    }

    fn render(&self, code: &QrCode) -> GrayImage {
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let span = modules + 2 * self.margin;
        let scale = self.size.div_ceil(span).max(1);
        let side = span * scale;

        GrayImage::from_fn(side, side, |x, y| {
            let mx = (x / scale).checked_sub(self.margin);
            let my = (y / scale).checked_sub(self.margin);
            match (mx, my) {
                (Some(mx), Some(my)) if mx < modules && my < modules => {
                    match colors[(my * modules + mx) as usize] {
                        Color::Dark => DARK,
                        Color::Light => LIGHT,
                    }
                }
                _ => LIGHT,
            }
        })
    }
}

impl QrEncoder for PngQrEncoder {
    fn encode_png(&self, data: &str) -> Result<Vec<u8>, QrError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
            .map_err(|e| QrError::Encode(e.to_string()))?;

        let image = self.render(&code);

        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| QrError::Image(e.to_string()))?;
        Ok(bytes)
    }
}
