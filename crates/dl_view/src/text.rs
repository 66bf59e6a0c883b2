use std::sync::Arc;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, SwashCache, fontdb};
use dl_rendering::{Point, TEXT_LINE_HEIGHT, TextStyle};
use dl_resources::FontResource;
use tiny_skia::{Mask, Paint, Pixmap, Rect, Transform};

/// Shapes and rasterizes text with the fonts registered on a view.
///
/// The font database starts empty: only registered fonts are used, so output does not
/// depend on the fonts installed on the host. Without any font, text draws nothing.
pub struct TextRenderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    families: Vec<String>,
}

impl TextRenderer {
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new_with_locale_and_db(
                "en-US".to_string(),
                fontdb::Database::new(),
            ),
            swash_cache: SwashCache::new(),
            families: Vec::new(),
        }
    }

    /// Load newly registered fonts.
    pub fn load_fonts(&mut self, fonts: &[Arc<FontResource>]) {
        for font in fonts {
            let faces = self
                .font_system
                .db_mut()
                .load_font_source(fontdb::Source::Binary(font.data.clone()));
            if faces.is_empty() {
                log::warn!("font family {} has no usable faces", font.family);
                continue;
            }
            log::debug!("text renderer loaded font family {}", font.family);
            self.families.push(font.family.clone());
        }
    }

    pub fn has_fonts(&self) -> bool {
        !self.families.is_empty()
    }

    pub fn families(&self) -> &[String] {
        &self.families
    }

    /// Draw `text` with its first line box at `position` (content space).
    ///
    /// `transform` must be a scale + translate; glyphs are shaped at the device size.
    pub fn draw(
        &mut self,
        target: &mut Pixmap,
        text: &str,
        position: Point,
        style: &TextStyle,
        transform: Transform,
        mask: Option<&Mask>,
    ) {
        let Some(default_family) = self.families.first() else {
            return;
        };
        let family = style
            .font_family
            .as_deref()
            .filter(|name| self.families.iter().any(|f| f.eq_ignore_ascii_case(name)))
            .unwrap_or(default_family)
            .to_string();

        let font_size = style.font_size * transform.sy;
        if text.is_empty() || !font_size.is_finite() || font_size < 1.0 {
            return;
        }
        let origin_x = position.x * transform.sx + transform.tx;
        let origin_y = position.y * transform.sy + transform.ty;

        let font_system = &mut self.font_system;
        let metrics = Metrics::new(font_size, font_size * TEXT_LINE_HEIGHT);
        let mut buffer = Buffer::new(font_system, metrics);
        buffer.set_size(font_system, None, None);
        let attrs = Attrs::new().family(Family::Name(&family));
        buffer.set_text(font_system, text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(font_system, false);

        let [r, g, b, a] = style.color.to_rgba8();
        let mut paint = Paint::default();
        paint.anti_alias = false;

        buffer.draw(
            font_system,
            &mut self.swash_cache,
            cosmic_text::Color::rgba(r, g, b, a),
            |x, y, w, h, color| {
                if color.a() == 0 {
                    return;
                }
                let Some(rect) = Rect::from_xywh(
                    origin_x + x as f32,
                    origin_y + y as f32,
                    w as f32,
                    h as f32,
                ) else {
                    return;
                };
                paint.set_color_rgba8(color.r(), color.g(), color.b(), color.a());
                target.fill_rect(rect, &paint, Transform::identity(), mask);
            },
        );
    }
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("families", &self.families)
            .finish()
    }
}
