use dl_rendering::{Color, DirtyRegionTracker, DisplayList, Rectangle, TileCache, TileCoord};
use dl_settings::{RenderMode, Settings};
use tiny_skia::{BlendMode, Paint, Pixmap, PixmapPaint, Rect, Transform};

use crate::raster::{RasterBackend, RasterError, map_rect, skia_color, unmap_rect};
use crate::state::ImageTable;
use crate::text::TextRenderer;

/// What changed since the previous frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invalidation {
    /// Content-space regions whose drawing changed.
    pub content: Vec<Rectangle>,
    /// Everything must be redrawn (size, images, fonts, blur flag).
    pub full: bool,
    /// Content-to-device scale changed.
    pub scale: bool,
    /// Device offset changed.
    pub viewport: bool,
}

impl Invalidation {
    pub fn everything() -> Self {
        Self {
            full: true,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: Invalidation) {
        self.content.extend(other.content);
        self.full |= other.full;
        self.scale |= other.scale;
        self.viewport |= other.viewport;
    }
}

/// Inputs shared by every mode.
pub struct FrameInput<'a> {
    pub list: &'a DisplayList,
    pub images: &'a ImageTable,
    pub text: &'a mut TextRenderer,
    pub allow_blur: bool,
    pub scale: f32,
    /// Device offset of the content origin.
    pub offset: (i32, i32),
}

impl FrameInput<'_> {
    fn device_transform(&self) -> Transform {
        Transform::from_scale(self.scale, self.scale)
            .post_translate(self.offset.0 as f32, self.offset.1 as f32)
    }
}

/// Result of one composite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeOutcome {
    /// Device regions whose pixels were rewritten.
    pub damage: Vec<Rectangle>,
    /// False when tile work was deferred to a later frame.
    pub complete: bool,
    /// Tiles rasterized this frame.
    pub tiles_rendered: usize,
}

/// Turns invalidations into pixels on the content frame.
pub struct Compositor {
    mode: RenderMode,
    background: Color,
    tracker: DirtyRegionTracker,
    tiles: TileCache<Pixmap>,
    max_tiles: usize,
    max_updates: usize,
    /// Tile render margin in layer pixels.
    margin: u32,
}

impl Compositor {
    pub fn new(settings: &Settings, width: u32, height: u32) -> Self {
        let (r, g, b) = settings.background_color;
        let mut tracker = DirtyRegionTracker::new(width as f32, height as f32);
        tracker.mark_full_redraw();
        Self {
            mode: settings.render_mode,
            background: Color::from_rgb8(r, g, b),
            tracker,
            tiles: TileCache::new(settings.tile_size, settings.max_tile_count as usize),
            max_tiles: settings.max_tile_count as usize,
            max_updates: settings.max_updates_per_frame.max(1) as usize,
            margin: 0,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        if self.mode != mode {
            log::debug!("render mode {:?} -> {mode:?}", self.mode);
            self.mode = mode;
            self.tiles.clear_all();
            self.tracker.mark_full_redraw();
        }
    }

    pub fn background(&self) -> Color {
        self.background
    }

    pub fn cached_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.tracker.set_bounds(width as f32, height as f32);
        self.tracker.mark_full_redraw();
        self.tiles.invalidate_all();
    }

    /// Record changes; they are consumed by the next successful composite.
    pub fn invalidate(
        &mut self,
        invalidation: &Invalidation,
        list: &DisplayList,
        scale: f32,
        offset: (i32, i32),
    ) {
        let transform =
            Transform::from_scale(scale, scale).post_translate(offset.0 as f32, offset.1 as f32);

        // Device-space tracking for direct and partial modes.
        if invalidation.full || invalidation.scale || invalidation.viewport {
            self.tracker.mark_full_redraw();
        } else {
            for rect in &invalidation.content {
                self.tracker.mark_dirty(map_rect(transform, *rect));
            }
        }

        // Layer-space tracking for tile mode; a pure offset change keeps the tiles.
        let margin = Self::margin_for(list, scale);
        if margin != self.margin {
            self.margin = margin;
            self.tiles.invalidate_all();
        }
        if invalidation.scale {
            self.tiles.clear_all();
        } else if invalidation.full {
            self.tiles.invalidate_all();
        } else {
            let layer = Transform::from_scale(scale, scale);
            for rect in &invalidation.content {
                self.tiles
                    .invalidate_rect(map_rect(layer, *rect).expand(self.margin as f32));
            }
        }
    }

    /// Blur sampling never crosses a blur rectangle, so this margin makes tiles seam-free.
    fn margin_for(list: &DisplayList, scale: f32) -> u32 {
        let radius = list.max_blur_radius() * scale;
        if radius > 0.0 {
            radius.ceil() as u32 + 1
        } else {
            0
        }
    }

    pub fn composite(
        &mut self,
        frame: &mut Pixmap,
        input: FrameInput<'_>,
    ) -> Result<CompositeOutcome, RasterError> {
        let outcome = match self.mode {
            RenderMode::Direct => self.composite_direct(frame, input)?,
            RenderMode::Partial => self.composite_partial(frame, input)?,
            RenderMode::Tile => self.composite_tiles(frame, input)?,
        };
        self.tracker.clear();
        Ok(outcome)
    }

    fn frame_bounds(frame: &Pixmap) -> Rectangle {
        Rectangle::new(0.0, 0.0, frame.width() as f32, frame.height() as f32)
    }

    fn composite_direct(
        &mut self,
        frame: &mut Pixmap,
        input: FrameInput<'_>,
    ) -> Result<CompositeOutcome, RasterError> {
        let transform = input.device_transform();
        frame.fill(skia_color(self.background));
        let mut backend =
            RasterBackend::new(frame, transform, input.images, input.text, input.allow_blur);
        input.list.execute(&mut backend)?;

        Ok(CompositeOutcome {
            damage: vec![Self::frame_bounds(frame)],
            complete: true,
            tiles_rendered: 0,
        })
    }

    fn composite_partial(
        &mut self,
        frame: &mut Pixmap,
        input: FrameInput<'_>,
    ) -> Result<CompositeOutcome, RasterError> {
        if self.tracker.needs_full_redraw() {
            return self.composite_direct(frame, input);
        }

        let transform = input.device_transform();
        // Grow regions over whole blur rects until stable; merges can reach new blurs.
        let blurs: Vec<Rectangle> = input
            .list
            .blur_regions()
            .map(|(rect, _)| map_rect(transform, rect).round_out())
            .collect();
        if !blurs.is_empty() {
            loop {
                let before = self.tracker.regions();
                for blur in &blurs {
                    self.tracker.expand_to_cover(*blur);
                }
                if self.tracker.regions() == before {
                    break;
                }
            }
        }

        let regions = self.tracker.regions();
        let mut paint = Paint::default();
        paint.set_color(skia_color(self.background));
        paint.blend_mode = BlendMode::Source;
        paint.anti_alias = false;

        for region in &regions {
            if let Some(rect) = Rect::from_xywh(region.x, region.y, region.width, region.height) {
                frame.fill_rect(rect, &paint, Transform::identity(), None);
            }
            let mut backend = RasterBackend::new(
                frame,
                transform,
                input.images,
                input.text,
                input.allow_blur,
            )
            .with_device_clip(*region)?;
            input
                .list
                .execute_in(&mut backend, unmap_rect(transform, *region))?;
        }

        Ok(CompositeOutcome {
            damage: regions,
            complete: true,
            tiles_rendered: 0,
        })
    }

    fn composite_tiles(
        &mut self,
        frame: &mut Pixmap,
        mut input: FrameInput<'_>,
    ) -> Result<CompositeOutcome, RasterError> {
        let bounds = Self::frame_bounds(frame);
        let (off_x, off_y) = input.offset;
        let visible_layer = bounds.translate(-(off_x as f32), -(off_y as f32));
        let visible = self.tiles.tiles_in_rect(visible_layer);

        self.tiles.set_capacity(self.max_tiles.max(visible.len()));

        let invalid = self.tiles.get_invalid_tiles(visible_layer);
        let deferred = invalid.len().saturating_sub(self.max_updates);
        for &coord in invalid.iter().take(self.max_updates) {
            let tile = self.render_tile(coord, &mut input)?;
            self.tiles.insert(coord, tile);
        }
        if deferred > 0 {
            log::debug!("{deferred} tiles deferred to the next frame");
        }

        frame.fill(skia_color(self.background));
        let paint = PixmapPaint {
            blend_mode: BlendMode::Source,
            ..PixmapPaint::default()
        };
        for &coord in &visible {
            let rect = self.tiles.tile_rect(coord);
            if let Some(tile) = self.tiles.get(coord) {
                frame.draw_pixmap(
                    rect.x as i32 + off_x,
                    rect.y as i32 + off_y,
                    tile.as_ref(),
                    &paint,
                    Transform::identity(),
                    None,
                );
            }
        }

        let evicted = self.tiles.evict_to_capacity(&visible);
        if !evicted.is_empty() {
            log::trace!("evicted {} tiles", evicted.len());
        }

        // Tiles that were invalid either changed or fell back to background.
        let damage = if self.tracker.needs_full_redraw() {
            vec![bounds]
        } else {
            invalid
                .iter()
                .filter_map(|&coord| {
                    self.tiles
                        .tile_rect(coord)
                        .translate(off_x as f32, off_y as f32)
                        .intersection(&bounds)
                })
                .collect()
        };

        Ok(CompositeOutcome {
            damage,
            complete: deferred == 0,
            tiles_rendered: invalid.len() - deferred,
        })
    }

    fn render_tile(
        &mut self,
        coord: TileCoord,
        input: &mut FrameInput<'_>,
    ) -> Result<Pixmap, RasterError> {
        let size = self.tiles.tile_size();
        let margin = self.margin;
        let full = size + margin * 2;
        let layer_rect = self.tiles.tile_rect(coord);

        let mut scratch = Pixmap::new(full, full).ok_or(RasterError::Allocation(full, full))?;
        scratch.fill(skia_color(self.background));
        let transform = Transform::from_scale(input.scale, input.scale).post_translate(
            margin as f32 - layer_rect.x,
            margin as f32 - layer_rect.y,
        );
        let area = Rectangle::new(0.0, 0.0, full as f32, full as f32);
        {
            let mut backend = RasterBackend::new(
                &mut scratch,
                transform,
                input.images,
                input.text,
                input.allow_blur,
            );
            input.list.execute_in(&mut backend, unmap_rect(transform, area))?;
        }

        if margin == 0 {
            return Ok(scratch);
        }
        let mut tile = self
            .tiles
            .take(coord)
            .filter(|old| old.width() == size && old.height() == size)
            .map_or_else(|| Pixmap::new(size, size), Some)
            .ok_or(RasterError::Allocation(size, size))?;
        tile.draw_pixmap(
            -(margin as i32),
            -(margin as i32),
            scratch.as_ref(),
            &PixmapPaint {
                blend_mode: BlendMode::Source,
                ..PixmapPaint::default()
            },
            Transform::identity(),
            None,
        );
        Ok(tile)
    }
}
