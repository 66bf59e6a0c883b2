use crate::types::{BitmapId, Color, DrawStyle, Point, Rectangle, TextStyle};

/// Backend that rasterizes display-list commands.
///
/// Coordinates are in content space; the backend owns the content-to-device transform.
pub trait RenderBackend {
    type Error;

    fn draw_rectangle(&mut self, rect: Rectangle, style: &DrawStyle) -> Result<(), Self::Error>;
    fn draw_rounded_rectangle(
        &mut self,
        rect: Rectangle,
        radius: f32,
        style: &DrawStyle,
    ) -> Result<(), Self::Error>;
    fn draw_circle(
        &mut self,
        center: Point,
        radius: f32,
        style: &DrawStyle,
    ) -> Result<(), Self::Error>;
    fn draw_line(&mut self, start: Point, end: Point, style: &DrawStyle)
    -> Result<(), Self::Error>;
    fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        style: &TextStyle,
    ) -> Result<(), Self::Error>;
    fn draw_image(
        &mut self,
        rect: Rectangle,
        bitmap: BitmapId,
        opacity: f32,
    ) -> Result<(), Self::Error>;

    /// Blur whatever is already drawn under `rect`, then cover it with `tint`.
    ///
    /// Backends with blur disabled only draw the tint.
    fn draw_backdrop_blur(
        &mut self,
        rect: Rectangle,
        radius: f32,
        tint: Color,
    ) -> Result<(), Self::Error>;

    fn push_clip_rect(&mut self, rect: Rectangle) -> Result<(), Self::Error>;
    fn pop_clip_rect(&mut self) -> Result<(), Self::Error>;
}

/// Draw command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Rectangle.
    Rectangle {
        rect: Rectangle,
        style: DrawStyle,
        z_order: i32,
    },

    /// Rounded rectangle.
    RoundedRectangle {
        rect: Rectangle,
        radius: f32,
        style: DrawStyle,
        z_order: i32,
    },

    /// Circle.
    Circle {
        center: Point,
        radius: f32,
        style: DrawStyle,
        z_order: i32,
    },

    /// Line.
    Line {
        start: Point,
        end: Point,
        style: DrawStyle,
        z_order: i32,
    },

    /// Text, `position` is the top-left corner of the first line box.
    Text {
        text: String,
        position: Point,
        style: TextStyle,
        z_order: i32,
    },

    /// Registered image stretched into `rect`.
    Image {
        rect: Rectangle,
        bitmap: BitmapId,
        opacity: f32,
        z_order: i32,
    },

    /// Backdrop blur.
    BackdropBlur {
        rect: Rectangle,
        radius: f32,
        tint: Color,
        z_order: i32,
    },

    /// Begin clip.
    PushClipRect { rect: Rectangle, z_order: i32 },

    /// End clip.
    PopClipRect { z_order: i32 },
}

/// Line height used for text bounds, as a multiple of the font size.
pub const TEXT_LINE_HEIGHT: f32 = 1.2;

impl DrawCommand {
    /// Get z-order for sorting.
    pub fn z_order(&self) -> i32 {
        match self {
            DrawCommand::Rectangle { z_order, .. } => *z_order,
            DrawCommand::RoundedRectangle { z_order, .. } => *z_order,
            DrawCommand::Circle { z_order, .. } => *z_order,
            DrawCommand::Line { z_order, .. } => *z_order,
            DrawCommand::Text { z_order, .. } => *z_order,
            DrawCommand::Image { z_order, .. } => *z_order,
            DrawCommand::BackdropBlur { z_order, .. } => *z_order,
            DrawCommand::PushClipRect { z_order, .. } => *z_order,
            DrawCommand::PopClipRect { z_order } => *z_order,
        }
    }

    /// Conservative content-space bounds of everything this command can touch.
    ///
    /// Clip commands have no bounds of their own.
    pub fn bounds(&self) -> Option<Rectangle> {
        let stroke_margin = |style: &DrawStyle| {
            if style.has_stroke() {
                style.stroke_width / 2.0 + 1.0
            } else {
                0.0
            }
        };

        match self {
            DrawCommand::Rectangle { rect, style, .. }
            | DrawCommand::RoundedRectangle { rect, style, .. } => {
                Some(rect.expand(stroke_margin(style)))
            }
            DrawCommand::Circle {
                center,
                radius,
                style,
                ..
            } => {
                let r = radius + stroke_margin(style);
                Some(Rectangle::new(center.x - r, center.y - r, r * 2.0, r * 2.0))
            }
            DrawCommand::Line {
                start, end, style, ..
            } => {
                let rect = Rectangle::from_bounds(
                    start.x.min(end.x),
                    start.y.min(end.y),
                    start.x.max(end.x),
                    start.y.max(end.y),
                );
                Some(rect.expand(style.stroke_width / 2.0 + 1.0))
            }
            DrawCommand::Text {
                text,
                position,
                style,
                ..
            } => {
                // 1em per character covers Latin, CJK and emoji advances.
                let lines = text.lines().count().max(1) as f32;
                let columns = text
                    .lines()
                    .map(|line| line.chars().count())
                    .max()
                    .unwrap_or(0) as f32;
                Some(
                    Rectangle::new(
                        position.x,
                        position.y,
                        style.font_size * columns.max(1.0),
                        style.font_size * TEXT_LINE_HEIGHT * lines,
                    )
                    .expand(style.font_size * 0.25),
                )
            }
            DrawCommand::Image { rect, .. } | DrawCommand::BackdropBlur { rect, .. } => {
                Some(*rect)
            }
            DrawCommand::PushClipRect { .. } | DrawCommand::PopClipRect { .. } => None,
        }
    }

    /// Region that changes when this command is added, removed or altered.
    fn damage_bounds(&self) -> Option<Rectangle> {
        match self {
            DrawCommand::PushClipRect { rect, .. } => Some(*rect),
            other => other.bounds(),
        }
    }

    /// Whether hit testing should consider this command.
    fn is_hit_target(&self) -> bool {
        !matches!(
            self,
            DrawCommand::PushClipRect { .. }
                | DrawCommand::PopClipRect { .. }
                | DrawCommand::BackdropBlur { .. }
        )
    }
}

/// Z-order layer constants.
pub mod z_order {
    /// Background fill and image.
    pub const BACKGROUND: i32 = 0;
    /// Decorative shapes.
    pub const SHAPES: i32 = 100;
    /// Blurred cards.
    pub const CARDS: i32 = 200;
    /// Images placed above the cards.
    pub const IMAGES: i32 = 300;
    /// Text.
    pub const TEXT: i32 = 400;
    /// Highlights drawn above everything else.
    pub const HIGHLIGHT: i32 = 500;
}

/// Display list.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DisplayList {
    items: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn submit(&mut self, item: DrawCommand) {
        self.items.push(item);
    }

    pub fn submit_batch(&mut self, items: impl IntoIterator<Item = DrawCommand>) {
        self.items.extend(items);
    }

    /// Stable sort, so commands with equal z-order keep submission order.
    pub fn sort_by_z_order(&mut self) {
        self.items.sort_by_key(|item| item.z_order());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawCommand> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&DrawCommand> {
        self.items.get(index)
    }

    /// Union of all command bounds.
    pub fn bounds(&self) -> Option<Rectangle> {
        self.items
            .iter()
            .filter_map(DrawCommand::bounds)
            .reduce(|acc, rect| acc.union(&rect))
    }

    /// Rectangles and radii of every backdrop blur.
    pub fn blur_regions(&self) -> impl Iterator<Item = (Rectangle, f32)> + '_ {
        self.items.iter().filter_map(|item| match item {
            DrawCommand::BackdropBlur { rect, radius, .. } => Some((*rect, *radius)),
            _ => None,
        })
    }

    /// Largest blur radius in the list, 0 when there is none.
    pub fn max_blur_radius(&self) -> f32 {
        self.blur_regions()
            .map(|(_, radius)| radius)
            .fold(0.0, f32::max)
    }

    /// Index of the topmost command whose bounds contain the content-space point.
    pub fn hit_test(&self, point: Point) -> Option<usize> {
        self.items
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, item)| item.is_hit_target())
            .find(|(_, item)| {
                item.bounds()
                    .is_some_and(|bounds| bounds.contains(point.x, point.y))
            })
            .map(|(index, _)| index)
    }

    /// Execute all commands, in list order, against a backend.
    pub fn execute<B: RenderBackend>(&self, backend: &mut B) -> Result<(), B::Error> {
        for item in &self.items {
            Self::render_item(backend, item)?;
        }

        Ok(())
    }

    /// Execute only the commands whose bounds intersect `visible` (content space).
    ///
    /// Clip commands always run so push/pop pairs stay balanced.
    pub fn execute_in<B: RenderBackend>(
        &self,
        backend: &mut B,
        visible: Rectangle,
    ) -> Result<(), B::Error> {
        for item in &self.items {
            if let Some(bounds) = item.bounds()
                && !bounds.intersects(&visible)
            {
                continue;
            }
            Self::render_item(backend, item)?;
        }

        Ok(())
    }

    fn render_item<B: RenderBackend>(backend: &mut B, item: &DrawCommand) -> Result<(), B::Error> {
        match item {
            DrawCommand::Rectangle { rect, style, .. } => backend.draw_rectangle(*rect, style)?,
            DrawCommand::RoundedRectangle {
                rect,
                radius,
                style,
                ..
            } => backend.draw_rounded_rectangle(*rect, *radius, style)?,
            DrawCommand::Circle {
                center,
                radius,
                style,
                ..
            } => backend.draw_circle(*center, *radius, style)?,
            DrawCommand::Line {
                start, end, style, ..
            } => backend.draw_line(*start, *end, style)?,
            DrawCommand::Text {
                text,
                position,
                style,
                ..
            } => backend.draw_text(text, *position, style)?,
            DrawCommand::Image {
                rect,
                bitmap,
                opacity,
                ..
            } => backend.draw_image(*rect, *bitmap, *opacity)?,
            DrawCommand::BackdropBlur {
                rect, radius, tint, ..
            } => backend.draw_backdrop_blur(*rect, *radius, *tint)?,
            DrawCommand::PushClipRect { rect, .. } => backend.push_clip_rect(*rect)?,
            DrawCommand::PopClipRect { .. } => backend.pop_clip_rect()?,
        }

        Ok(())
    }
}

/// Content-space regions that differ between two display lists.
///
/// Commands are compared index by index: a changed command damages both its old and new
/// bounds, a command that exists in only one list damages its own bounds.
pub fn diff_bounds(old: &DisplayList, new: &DisplayList) -> Vec<Rectangle> {
    let mut damage = Vec::new();
    let shared = old.len().min(new.len());

    for (before, after) in old.items[..shared].iter().zip(&new.items[..shared]) {
        if before != after {
            damage.extend(before.damage_bounds());
            damage.extend(after.damage_bounds());
        }
    }

    damage.extend(old.items[shared..].iter().filter_map(DrawCommand::damage_bounds));
    damage.extend(new.items[shared..].iter().filter_map(DrawCommand::damage_bounds));

    damage
}

/// Convenience builder for `DisplayList`.
pub struct DisplayListBuilder {
    list: DisplayList,
    default_z_order: i32,
}

impl DisplayListBuilder {
    pub fn new() -> Self {
        Self {
            list: DisplayList::new(),
            default_z_order: 0,
        }
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.default_z_order = z_order;
        self
    }

    pub fn rectangle(mut self, rect: Rectangle, style: DrawStyle) -> Self {
        self.list.submit(DrawCommand::Rectangle {
            rect,
            style,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn rounded_rectangle(mut self, rect: Rectangle, radius: f32, style: DrawStyle) -> Self {
        self.list.submit(DrawCommand::RoundedRectangle {
            rect,
            radius,
            style,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn circle(mut self, center: Point, radius: f32, style: DrawStyle) -> Self {
        self.list.submit(DrawCommand::Circle {
            center,
            radius,
            style,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn line(mut self, start: Point, end: Point, style: DrawStyle) -> Self {
        self.list.submit(DrawCommand::Line {
            start,
            end,
            style,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn text(mut self, text: impl Into<String>, position: Point, style: TextStyle) -> Self {
        self.list.submit(DrawCommand::Text {
            text: text.into(),
            position,
            style,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn image(mut self, rect: Rectangle, bitmap: BitmapId, opacity: f32) -> Self {
        self.list.submit(DrawCommand::Image {
            rect,
            bitmap,
            opacity,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn backdrop_blur(mut self, rect: Rectangle, radius: f32, tint: Color) -> Self {
        self.list.submit(DrawCommand::BackdropBlur {
            rect,
            radius,
            tint,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn push_clip(mut self, rect: Rectangle) -> Self {
        self.list.submit(DrawCommand::PushClipRect {
            rect,
            z_order: self.default_z_order,
        });
        self
    }

    pub fn pop_clip(mut self) -> Self {
        self.list.submit(DrawCommand::PopClipRect {
            z_order: self.default_z_order,
        });
        self
    }

    /// Finish the list, sorted by z-order.
    pub fn build(self) -> DisplayList {
        let mut list = self.list;
        list.sort_by_z_order();
        list
    }
}

impl Default for DisplayListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingBackend {
        calls: Vec<String>,
    }

    impl RenderBackend for RecordingBackend {
        type Error = ();

        fn draw_rectangle(&mut self, _: Rectangle, _: &DrawStyle) -> Result<(), ()> {
            self.calls.push("rect".into());
            Ok(())
        }
        fn draw_rounded_rectangle(&mut self, _: Rectangle, _: f32, _: &DrawStyle) -> Result<(), ()> {
            self.calls.push("rounded".into());
            Ok(())
        }
        fn draw_circle(&mut self, _: Point, _: f32, _: &DrawStyle) -> Result<(), ()> {
            self.calls.push("circle".into());
            Ok(())
        }
        fn draw_line(&mut self, _: Point, _: Point, _: &DrawStyle) -> Result<(), ()> {
            self.calls.push("line".into());
            Ok(())
        }
        fn draw_text(&mut self, text: &str, _: Point, _: &TextStyle) -> Result<(), ()> {
            self.calls.push(format!("text:{text}"));
            Ok(())
        }
        fn draw_image(&mut self, _: Rectangle, bitmap: BitmapId, _: f32) -> Result<(), ()> {
            self.calls.push(format!("image:{bitmap}"));
            Ok(())
        }
        fn draw_backdrop_blur(&mut self, _: Rectangle, _: f32, _: Color) -> Result<(), ()> {
            self.calls.push("blur".into());
            Ok(())
        }
        fn push_clip_rect(&mut self, _: Rectangle) -> Result<(), ()> {
            self.calls.push("push".into());
            Ok(())
        }
        fn pop_clip_rect(&mut self) -> Result<(), ()> {
            self.calls.push("pop".into());
            Ok(())
        }
    }

    #[test]
    fn test_build_sorts_by_z_order_stably() {
        let list = DisplayListBuilder::new()
            .with_z_order(z_order::TEXT)
            .text("title", Point::ZERO, TextStyle::default())
            .with_z_order(z_order::BACKGROUND)
            .rectangle(Rectangle::new(0.0, 0.0, 10.0, 10.0), DrawStyle::default())
            .image(Rectangle::new(0.0, 0.0, 10.0, 10.0), 7, 1.0)
            .build();

        let mut backend = RecordingBackend::default();
        list.execute(&mut backend).unwrap();

        assert_eq!(backend.calls, vec!["rect", "image:7", "text:title"]);
    }

    #[test]
    fn test_stroke_expands_bounds() {
        let item = DrawCommand::Rectangle {
            rect: Rectangle::new(10.0, 10.0, 20.0, 20.0),
            style: DrawStyle::stroke(Color::BLACK, 4.0),
            z_order: 0,
        };
        assert_eq!(item.bounds(), Some(Rectangle::new(7.0, 7.0, 26.0, 26.0)));

        let filled = DrawCommand::Rectangle {
            rect: Rectangle::new(10.0, 10.0, 20.0, 20.0),
            style: DrawStyle::fill(Color::WHITE),
            z_order: 0,
        };
        assert_eq!(filled.bounds(), Some(Rectangle::new(10.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn test_diff_reports_changed_items_only() {
        let old = DisplayListBuilder::new()
            .rectangle(
                Rectangle::new(0.0, 0.0, 10.0, 10.0),
                DrawStyle::fill(Color::WHITE),
            )
            .rectangle(
                Rectangle::new(50.0, 50.0, 10.0, 10.0),
                DrawStyle::fill(Color::WHITE),
            )
            .build();
        let new = DisplayListBuilder::new()
            .rectangle(
                Rectangle::new(0.0, 0.0, 10.0, 10.0),
                DrawStyle::fill(Color::WHITE),
            )
            .rectangle(
                Rectangle::new(60.0, 50.0, 10.0, 10.0),
                DrawStyle::fill(Color::WHITE),
            )
            .circle(Point::new(100.0, 100.0), 5.0, DrawStyle::fill(Color::BLACK))
            .build();

        let damage = diff_bounds(&old, &new);

        assert_eq!(
            damage,
            vec![
                Rectangle::new(50.0, 50.0, 10.0, 10.0),
                Rectangle::new(60.0, 50.0, 10.0, 10.0),
                Rectangle::new(95.0, 95.0, 10.0, 10.0),
            ]
        );
        assert!(diff_bounds(&new, &new).is_empty());
    }

    #[test]
    fn test_hit_test_returns_topmost_item() {
        let list = DisplayListBuilder::new()
            .with_z_order(z_order::BACKGROUND)
            .rectangle(
                Rectangle::new(0.0, 0.0, 100.0, 100.0),
                DrawStyle::fill(Color::WHITE),
            )
            .with_z_order(z_order::CARDS)
            .backdrop_blur(Rectangle::new(0.0, 0.0, 100.0, 100.0), 8.0, Color::WHITE)
            .with_z_order(z_order::SHAPES)
            .circle(Point::new(50.0, 50.0), 10.0, DrawStyle::fill(Color::BLACK))
            .build();

        // 模糊层不参与命中测试
        assert_eq!(list.hit_test(Point::new(50.0, 50.0)), Some(1));
        assert_eq!(list.hit_test(Point::new(5.0, 5.0)), Some(0));
        assert_eq!(list.hit_test(Point::new(500.0, 5.0)), None);
    }

    #[test]
    fn test_execute_in_culls_but_keeps_clips() {
        let list = DisplayListBuilder::new()
            .push_clip(Rectangle::new(0.0, 0.0, 500.0, 500.0))
            .rectangle(
                Rectangle::new(0.0, 0.0, 10.0, 10.0),
                DrawStyle::fill(Color::WHITE),
            )
            .rectangle(
                Rectangle::new(300.0, 300.0, 10.0, 10.0),
                DrawStyle::fill(Color::WHITE),
            )
            .pop_clip()
            .build();

        let mut backend = RecordingBackend::default();
        list.execute_in(&mut backend, Rectangle::new(290.0, 290.0, 50.0, 50.0))
            .unwrap();

        assert_eq!(backend.calls, vec!["push", "rect", "pop"]);
    }

    #[test]
    fn test_max_blur_radius() {
        let list = DisplayListBuilder::new()
            .backdrop_blur(Rectangle::new(0.0, 0.0, 10.0, 10.0), 4.0, Color::WHITE)
            .backdrop_blur(Rectangle::new(0.0, 0.0, 10.0, 10.0), 12.0, Color::WHITE)
            .build();

        assert_eq!(list.max_blur_radius(), 12.0);
        assert_eq!(DisplayList::new().max_blur_radius(), 0.0);
    }
}
