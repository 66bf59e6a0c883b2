use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dl_rendering::{BitmapId, Point};
use dl_resources::ImageResource;
use dl_settings::Settings;

use crate::error::{ViewError, ViewResult};

/// Largest accepted width or height, in device pixels.
pub const MAX_DIMENSION: u32 = 16_384;

pub const MIN_ZOOM: f32 = 0.01;
pub const MAX_ZOOM: f32 = 20.0;

const MIN_DENSITY: f32 = 0.25;
const MAX_DENSITY: f32 = 8.0;

/// Images by bitmap id, as the rasterizer looks them up.
pub type ImageTable = HashMap<BitmapId, Arc<ImageResource>>;

/// Scene selection and content-to-device mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub draw_index: u32,
    /// Content scale, 1.0 = 100%.
    pub zoom: f32,
    /// Content offset in logical pixels.
    pub offset: Point,
}

impl Viewport {
    /// Zoom is clamped to 1%..2000%; non-finite values fall back to identity.
    pub fn new(draw_index: u32, zoom: f32, offset_x: f32, offset_y: f32) -> Self {
        let zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        let finite_or_zero = |v: f32| if v.is_finite() { v } else { 0.0 };
        Self {
            draw_index,
            zoom,
            offset: Point::new(finite_or_zero(offset_x), finite_or_zero(offset_y)),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0, 1.0, 0.0, 0.0)
    }
}

/// Where `setImagePath` puts an image.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImageSlot {
    Background,
    Named(String),
}

/// Everything a frame depends on besides registered fonts.
#[derive(Debug, Clone)]
pub struct ViewState {
    /// Device pixels.
    pub width: u32,
    pub height: u32,
    /// Device pixel ratio.
    pub density: f32,
    pub allow_blur: bool,
    pub show_dirty_rect: bool,
    pub background: Option<Arc<ImageResource>>,
    pub images: BTreeMap<String, Arc<ImageResource>>,
    pub viewport: Viewport,
}

impl ViewState {
    pub fn new(width: u32, height: u32, settings: &Settings) -> Self {
        Self {
            width,
            height,
            density: 1.0,
            allow_blur: settings.allow_blur,
            show_dirty_rect: settings.show_dirty_rect,
            background: None,
            images: BTreeMap::new(),
            viewport: Viewport::default(),
        }
    }

    /// Validate a requested size.
    pub fn validate_size(width: i64, height: i64) -> ViewResult<(u32, u32)> {
        let valid = |v: i64| v > 0 && v <= MAX_DIMENSION as i64;
        if !valid(width) || !valid(height) {
            return Err(ViewError::InvalidDimension { width, height });
        }
        Ok((width as u32, height as u32))
    }

    /// Invalid densities fall back to 1.0.
    pub fn sanitize_density(density: f32) -> f32 {
        if density.is_finite() && density > 0.0 {
            density.clamp(MIN_DENSITY, MAX_DENSITY)
        } else {
            log::warn!("ignoring invalid density {density}");
            1.0
        }
    }

    pub fn set_image(&mut self, slot: ImageSlot, image: Arc<ImageResource>) {
        match slot {
            ImageSlot::Background => self.background = Some(image),
            ImageSlot::Named(name) => {
                self.images.insert(name, image);
            }
        }
    }

    pub fn named_image(&self, name: &str) -> Option<&Arc<ImageResource>> {
        self.images.get(name)
    }

    pub fn image_table(&self) -> ImageTable {
        self.background
            .iter()
            .chain(self.images.values())
            .map(|image| (image.id, Arc::clone(image)))
            .collect()
    }

    /// Content-to-device scale.
    pub fn scale(&self) -> f32 {
        self.viewport.zoom * self.density
    }

    /// Content offset in whole device pixels.
    pub fn device_offset(&self) -> (i32, i32) {
        (
            (self.viewport.offset.x * self.density).round() as i32,
            (self.viewport.offset.y * self.density).round() as i32,
        )
    }

    /// View size in logical pixels, the space scenes lay out in.
    pub fn logical_size(&self) -> (f32, f32) {
        (
            self.width as f32 / self.density,
            self.height as f32 / self.density,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_and_oversized() {
        assert!(ViewState::validate_size(0, 0).is_err());
        assert!(ViewState::validate_size(-5, 10).is_err());
        assert!(ViewState::validate_size(10, -1).is_err());
        assert!(ViewState::validate_size(MAX_DIMENSION as i64 + 1, 10).is_err());
        assert_eq!(ViewState::validate_size(640, 480), Ok((640, 480)));

        assert_eq!(
            ViewState::validate_size(0, 7),
            Err(ViewError::InvalidDimension {
                width: 0,
                height: 7
            })
        );
    }

    #[test]
    fn viewport_clamps_zoom() {
        assert_eq!(Viewport::new(0, 100.0, 0.0, 0.0).zoom, MAX_ZOOM);
        assert_eq!(Viewport::new(0, 0.0, 0.0, 0.0).zoom, MIN_ZOOM);
        assert_eq!(Viewport::new(0, f32::NAN, 0.0, 0.0).zoom, 1.0);
        assert_eq!(
            Viewport::new(0, 1.0, f32::INFINITY, 3.0).offset,
            Point::new(0.0, 3.0)
        );
    }

    #[test]
    fn scale_and_offset_follow_density() {
        let mut state = ViewState::new(200, 100, &Settings::default());
        state.density = ViewState::sanitize_density(2.0);
        state.viewport = Viewport::new(1, 1.5, 10.25, -4.0);

        assert_eq!(state.scale(), 3.0);
        assert_eq!(state.device_offset(), (21, -8));
        assert_eq!(state.logical_size(), (100.0, 50.0));
        assert_eq!(ViewState::sanitize_density(-1.0), 1.0);
    }
}
