use dl_rendering::{BitmapId, Color, DrawStyle, Point, Rectangle, RenderBackend, TextStyle};
use thiserror::Error;
use tiny_skia::{
    BlendMode, FillRule, FilterQuality, IntSize, Mask, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, Rect, Stroke, Transform,
};

use crate::blur;
use crate::state::ImageTable;
use crate::text::TextRenderer;

/// Rasterization errors
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("bitmap {0} is not registered")]
    UnknownBitmap(BitmapId),

    #[error("pop_clip_rect without matching push")]
    ClipUnderflow,

    #[error("cannot allocate {0}x{1} buffer")]
    Allocation(u32, u32),
}

/// Convert to a tiny-skia color.
pub fn skia_color(color: Color) -> tiny_skia::Color {
    let [r, g, b, a] = color.to_rgba8();
    tiny_skia::Color::from_rgba8(r, g, b, a)
}

/// Map a content rectangle through a scale + translate transform.
pub fn map_rect(transform: Transform, rect: Rectangle) -> Rectangle {
    Rectangle::new(
        rect.x * transform.sx + transform.tx,
        rect.y * transform.sy + transform.ty,
        rect.width * transform.sx,
        rect.height * transform.sy,
    )
}

/// Inverse of [`map_rect`].
pub fn unmap_rect(transform: Transform, rect: Rectangle) -> Rectangle {
    Rectangle::new(
        (rect.x - transform.tx) / transform.sx,
        (rect.y - transform.ty) / transform.sy,
        rect.width / transform.sx,
        rect.height / transform.sy,
    )
}

fn to_rect(rect: Rectangle) -> Option<Rect> {
    Rect::from_xywh(rect.x, rect.y, rect.width, rect.height)
}

/// Rounded rectangle as cubic arcs.
fn rounded_rect_path(rect: Rectangle, radius: f32) -> Option<Path> {
    let r = radius.max(0.0).min(rect.width / 2.0).min(rect.height / 2.0);
    if r <= 0.0 {
        return to_rect(rect).map(PathBuilder::from_rect);
    }
    // Cubic approximation of a quarter circle.
    let k = r * 0.552_284_8;
    let (l, t, rt, b) = (rect.x, rect.y, rect.right(), rect.bottom());

    let mut pb = PathBuilder::new();
    pb.move_to(l + r, t);
    pb.line_to(rt - r, t);
    pb.cubic_to(rt - r + k, t, rt, t + r - k, rt, t + r);
    pb.line_to(rt, b - r);
    pb.cubic_to(rt, b - r + k, rt - r + k, b, rt - r, b);
    pb.line_to(l + r, b);
    pb.cubic_to(l + r - k, b, l, b - r + k, l, b - r);
    pb.line_to(l, t + r);
    pb.cubic_to(l, t + r - k, l + r - k, t, l + r, t);
    pb.close();
    pb.finish()
}

/// CPU backend that draws display-list commands into a pixmap.
pub struct RasterBackend<'a> {
    target: &'a mut Pixmap,
    transform: Transform,
    images: &'a ImageTable,
    text: &'a mut TextRenderer,
    allow_blur: bool,
    base_clip: Option<Mask>,
    clips: Vec<Mask>,
}

impl<'a> RasterBackend<'a> {
    pub fn new(
        target: &'a mut Pixmap,
        transform: Transform,
        images: &'a ImageTable,
        text: &'a mut TextRenderer,
        allow_blur: bool,
    ) -> Self {
        Self {
            target,
            transform,
            images,
            text,
            allow_blur,
            base_clip: None,
            clips: Vec::new(),
        }
    }

    /// Restrict every draw to a device-space rectangle.
    pub fn with_device_clip(mut self, rect: Rectangle) -> Result<Self, RasterError> {
        let mut mask = self.new_mask()?;
        if let Some(rect) = to_rect(rect) {
            mask.fill_path(
                &PathBuilder::from_rect(rect),
                FillRule::Winding,
                false,
                Transform::identity(),
            );
        }
        self.base_clip = Some(mask);
        Ok(self)
    }

    fn new_mask(&self) -> Result<Mask, RasterError> {
        Mask::new(self.target.width(), self.target.height())
            .ok_or(RasterError::Allocation(self.target.width(), self.target.height()))
    }

    fn mask(&self) -> Option<&Mask> {
        self.clips.last().or(self.base_clip.as_ref())
    }

    fn paint(color: Color) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(skia_color(color));
        paint.anti_alias = true;
        paint
    }

    fn fill_and_stroke(&mut self, path: &Path, style: &DrawStyle) {
        let transform = self.transform;
        if let Some(fill) = style.fill_color {
            let paint = Self::paint(fill);
            let mask = self.clips.last().or(self.base_clip.as_ref());
            self.target
                .fill_path(path, &paint, FillRule::Winding, transform, mask);
        }
        if style.has_stroke() {
            self.stroke(path, style);
        }
    }

    fn stroke(&mut self, path: &Path, style: &DrawStyle) {
        let paint = Self::paint(style.stroke_color);
        let stroke = Stroke {
            width: style.stroke_width,
            ..Stroke::default()
        };
        let mask = self.clips.last().or(self.base_clip.as_ref());
        self.target
            .stroke_path(path, &paint, &stroke, self.transform, mask);
    }

    fn fill_device_rect(&mut self, rect: Rectangle, color: Color) {
        let Some(rect) = to_rect(rect) else {
            return;
        };
        let paint = Self::paint(color);
        let mask = self.clips.last().or(self.base_clip.as_ref());
        self.target
            .fill_rect(rect, &paint, Transform::identity(), mask);
    }

    /// Blur the pixels under a device rectangle in place.
    fn blur_device_rect(&mut self, rect: Rectangle, radius_px: f32) -> Result<(), RasterError> {
        let bounds = Rectangle::new(
            0.0,
            0.0,
            self.target.width() as f32,
            self.target.height() as f32,
        );
        let Some(region) = rect.round_out().intersection(&bounds) else {
            return Ok(());
        };
        let (x0, y0) = (region.x as u32, region.y as u32);
        let (w, h) = (region.width as u32, region.height as u32);

        let stride = self.target.width() as usize * 4;
        let mut data = Vec::with_capacity(w as usize * h as usize * 4);
        for row in y0..y0 + h {
            let start = row as usize * stride + x0 as usize * 4;
            data.extend_from_slice(&self.target.data()[start..start + w as usize * 4]);
        }

        blur::blur_rgba8_premul(&mut data, w, h, &blur::kernel_for_radius(radius_px));

        let size = IntSize::from_wh(w, h).ok_or(RasterError::Allocation(w, h))?;
        let blurred = Pixmap::from_vec(data, size).ok_or(RasterError::Allocation(w, h))?;
        let paint = PixmapPaint {
            blend_mode: BlendMode::Source,
            ..PixmapPaint::default()
        };
        let mask = self.clips.last().or(self.base_clip.as_ref());
        self.target.draw_pixmap(
            x0 as i32,
            y0 as i32,
            blurred.as_ref(),
            &paint,
            Transform::identity(),
            mask,
        );
        Ok(())
    }
}

impl RenderBackend for RasterBackend<'_> {
    type Error = RasterError;

    fn draw_rectangle(&mut self, rect: Rectangle, style: &DrawStyle) -> Result<(), RasterError> {
        if let Some(rect) = to_rect(rect) {
            self.fill_and_stroke(&PathBuilder::from_rect(rect), style);
        }
        Ok(())
    }

    fn draw_rounded_rectangle(
        &mut self,
        rect: Rectangle,
        radius: f32,
        style: &DrawStyle,
    ) -> Result<(), RasterError> {
        if let Some(path) = rounded_rect_path(rect, radius) {
            self.fill_and_stroke(&path, style);
        }
        Ok(())
    }

    fn draw_circle(
        &mut self,
        center: Point,
        radius: f32,
        style: &DrawStyle,
    ) -> Result<(), RasterError> {
        if let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) {
            self.fill_and_stroke(&path, style);
        }
        Ok(())
    }

    fn draw_line(&mut self, start: Point, end: Point, style: &DrawStyle) -> Result<(), RasterError> {
        if style.stroke_width <= 0.0 {
            return Ok(());
        }
        let mut pb = PathBuilder::new();
        pb.move_to(start.x, start.y);
        pb.line_to(end.x, end.y);
        if let Some(path) = pb.finish() {
            self.stroke(&path, style);
        }
        Ok(())
    }

    fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        style: &TextStyle,
    ) -> Result<(), RasterError> {
        let mask = self.clips.last().or(self.base_clip.as_ref());
        self.text
            .draw(self.target, text, position, style, self.transform, mask);
        Ok(())
    }

    fn draw_image(
        &mut self,
        rect: Rectangle,
        bitmap: BitmapId,
        opacity: f32,
    ) -> Result<(), RasterError> {
        let image = self
            .images
            .get(&bitmap)
            .ok_or(RasterError::UnknownBitmap(bitmap))?;
        let pixmap = &image.pixmap;
        if rect.is_empty() || opacity <= 0.0 {
            return Ok(());
        }

        let transform = self
            .transform
            .pre_translate(rect.x, rect.y)
            .pre_scale(
                rect.width / pixmap.width() as f32,
                rect.height / pixmap.height() as f32,
            );
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0),
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let mask = self.clips.last().or(self.base_clip.as_ref());
        self.target
            .draw_pixmap(0, 0, pixmap.as_ref(), &paint, transform, mask);
        Ok(())
    }

    fn draw_backdrop_blur(
        &mut self,
        rect: Rectangle,
        radius: f32,
        tint: Color,
    ) -> Result<(), RasterError> {
        let device_rect = map_rect(self.transform, rect);
        if self.allow_blur && radius > 0.0 {
            self.blur_device_rect(device_rect, radius * self.transform.sx)?;
        }
        if tint.a > 0.0 {
            self.fill_device_rect(device_rect, tint);
        }
        Ok(())
    }

    fn push_clip_rect(&mut self, rect: Rectangle) -> Result<(), RasterError> {
        let mut mask = match self.mask() {
            Some(current) => current.clone(),
            None => {
                let mut mask = self.new_mask()?;
                // Start fully visible, then intersect.
                if let Some(full) = Rect::from_xywh(
                    0.0,
                    0.0,
                    self.target.width() as f32,
                    self.target.height() as f32,
                ) {
                    mask.fill_path(
                        &PathBuilder::from_rect(full),
                        FillRule::Winding,
                        false,
                        Transform::identity(),
                    );
                }
                mask
            }
        };
        match to_rect(rect) {
            Some(clip) => mask.intersect_path(
                &PathBuilder::from_rect(clip),
                FillRule::Winding,
                true,
                self.transform,
            ),
            None => mask.data_mut().fill(0),
        }
        self.clips.push(mask);
        Ok(())
    }

    fn pop_clip_rect(&mut self) -> Result<(), RasterError> {
        self.clips.pop().map(|_| ()).ok_or(RasterError::ClipUnderflow)
    }
}
