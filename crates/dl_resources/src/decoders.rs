use std::sync::Arc;

use cosmic_text::fontdb;
use dl_platform::{DecodedFont, FontDecoder, ImageDecoder, PlatformError};
use tiny_skia::{IntSize, Pixmap};

/// Image decoder backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Pixmap, PlatformError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| PlatformError::Decode(format!("image decode failed: {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let size = IntSize::from_wh(width, height)
            .ok_or_else(|| PlatformError::Decode(format!("invalid image size {width}x{height}")))?;

        let mut data = rgba.into_raw();
        premultiply(&mut data);

        Pixmap::from_vec(data, size)
            .ok_or_else(|| PlatformError::Decode("pixel buffer does not match size".to_string()))
    }
}

/// Convert straight RGBA8 to the premultiplied layout tiny-skia expects.
fn premultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for channel in &mut px[..3] {
            *channel = ((*channel as u16 * a + 127) / 255) as u8;
        }
    }
}

/// Font parser backed by `fontdb`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontdbDecoder;

impl FontDecoder for FontdbDecoder {
    fn decode(&self, bytes: Vec<u8>) -> Result<DecodedFont, PlatformError> {
        if bytes.is_empty() {
            return Err(PlatformError::Decode("empty font data".to_string()));
        }

        let data = Arc::new(bytes);
        let mut db = fontdb::Database::new();
        let ids = db.load_font_source(fontdb::Source::Binary(data.clone()));
        let family = ids
            .first()
            .and_then(|id| db.face(*id))
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
            .ok_or_else(|| PlatformError::Decode("no usable font face".to_string()))?;

        Ok(DecodedFont { family, data })
    }
}
