use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::{errors::Error, Result};

/// Turns text into an image. Pure: no state, no retries.
pub trait QrEncoder: Send + Sync {
    /// Encode `text` and return the image bytes.
    fn encode(&self, text: &str) -> Result<Vec<u8>>;
}

/// PNG output via the `qrcode` renderer.
#[derive(Clone, Copy, Debug)]
pub struct PngQrEncoder {
    pub ec_level: EcLevel,
    /// Lower bound on the rendered side length in pixels.
    pub min_size: u32,
}

impl Default for PngQrEncoder {
    fn default() -> Self {
        Self {
            ec_level: EcLevel::M,
            min_size: 512,
        }
    }
}

impl QrEncoder for PngQrEncoder {
    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let code = QrCode::with_error_correction_level(text.as_bytes(), self.ec_level)
            .map_err(|e| Error::QrEncode(e.to_string()))?;

        let img = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .min_dimensions(self.min_size, self.min_size)
            .build();

        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| Error::QrEncode(e.to_string()))?;
        Ok(buf)
    }
}
