use std::io::Cursor;
use std::sync::LazyLock;

use base64::Engine;
use image::{ImageFormat, ImageReader, RgbImage};

use crate::errors::PhoneClawResult;

pub const FALLBACK_WIDTH: u32 = 1080;
pub const FALLBACK_HEIGHT: u32 = 2400;

static FALLBACK_PNG: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let img = RgbImage::new(FALLBACK_WIDTH, FALLBACK_HEIGHT);
    let mut buf = Vec::new();
    if let Err(e) = img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png) {
        tracing::warn!(error = %e, "could not encode fallback screenshot");
        buf.clear();
    }
    buf
});

#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    /// PNG bytes.
    pub image_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// The device could not be captured and this is a black placeholder.
    pub is_fallback: bool,
    /// The device refused capture, typically a payment or password screen.
    pub is_sensitive: bool,
}

impl Screenshot {
    /// Reads dimensions from the PNG header without decoding pixels.
    pub fn from_png(image_bytes: Vec<u8>) -> PhoneClawResult<Self> {
        let (width, height) = ImageReader::new(Cursor::new(&image_bytes))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Self {
            image_bytes,
            width,
            height,
            is_fallback: false,
            is_sensitive: false,
        })
    }

    /// Black 1080×2400 placeholder.
    pub fn fallback(is_sensitive: bool) -> Self {
        Self {
            image_bytes: FALLBACK_PNG.clone(),
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
            is_fallback: true,
            is_sensitive,
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.image_bytes)
    }
}
