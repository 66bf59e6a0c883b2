use dl_rendering::{
    Color, DisplayList, DisplayListBuilder, DrawStyle, Point, Rectangle, TextStyle, z_order,
};

use crate::state::ViewState;

/// Named image slots the demo scenes look for.
pub const BRIDGE_IMAGE: &str = "bridge";
pub const LOGO_IMAGE: &str = "TGFX";

/// Number of built-in scenes; `drawIndex` wraps around it.
pub const SCENE_COUNT: u32 = 2;

/// Inputs of one scene build.
#[derive(Debug, Clone, Copy)]
pub struct SceneContext<'a> {
    pub state: &'a ViewState,
    /// Advances once per caller-requested frame.
    pub tick: u64,
    pub background: Color,
    pub blur_radius: f32,
}

impl SceneContext<'_> {
    /// Layout size in logical pixels.
    pub fn size(&self) -> (f32, f32) {
        self.state.logical_size()
    }
}

/// Produces the display list of a frame.
pub trait SceneBuilder: Send {
    fn build(&mut self, ctx: &SceneContext<'_>) -> DisplayList;
}

/// The two demo scenes selected by `drawIndex`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoScenes;

impl SceneBuilder for DemoScenes {
    fn build(&mut self, ctx: &SceneContext<'_>) -> DisplayList {
        match ctx.state.viewport.draw_index % SCENE_COUNT {
            0 => gallery(ctx),
            _ => motion(ctx),
        }
    }
}

pub fn scene_name(draw_index: u32) -> &'static str {
    match draw_index % SCENE_COUNT {
        0 => "gallery",
        _ => "motion",
    }
}

/// Static scene: backdrop image, shapes, a frosted card with logo and title.
fn gallery(ctx: &SceneContext<'_>) -> DisplayList {
    let (w, h) = ctx.size();
    let state = ctx.state;
    let mut builder = DisplayListBuilder::new()
        .with_z_order(z_order::BACKGROUND)
        .rectangle(Rectangle::new(0.0, 0.0, w, h), DrawStyle::fill(ctx.background));

    if let Some(image) = state
        .background
        .as_ref()
        .or_else(|| state.named_image(BRIDGE_IMAGE))
    {
        builder = builder.image(Rectangle::new(0.0, 0.0, w, h), image.id, 1.0);
    }

    let short_side = w.min(h);
    builder = builder
        .with_z_order(z_order::SHAPES)
        .circle(
            Point::new(w * 0.22, h * 0.3),
            short_side * 0.12,
            DrawStyle::fill(Color::rgb(0.96, 0.42, 0.32)),
        )
        .rounded_rectangle(
            Rectangle::new(w * 0.6, h * 0.12, w * 0.28, h * 0.3),
            16.0,
            DrawStyle::fill(Color::rgb(0.25, 0.55, 0.95)),
        )
        .line(
            Point::new(w * 0.1, h * 0.88),
            Point::new(w * 0.9, h * 0.88),
            DrawStyle::stroke(Color::rgb(0.2, 0.2, 0.25), 3.0),
        );

    let card = Rectangle::new(w * 0.15, h * 0.4, w * 0.7, h * 0.35);
    builder = builder
        .with_z_order(z_order::CARDS)
        .backdrop_blur(card, ctx.blur_radius, Color::rgba(1.0, 1.0, 1.0, 0.35))
        .rounded_rectangle(
            card,
            12.0,
            DrawStyle::stroke(Color::rgba(1.0, 1.0, 1.0, 0.6), 1.5),
        );

    let logo_side = (card.height - 32.0).clamp(0.0, 64.0);
    if let Some(logo) = state.named_image(LOGO_IMAGE) {
        let aspect = logo.pixmap.width() as f32 / logo.pixmap.height().max(1) as f32;
        builder = builder.with_z_order(z_order::IMAGES).image(
            Rectangle::new(card.x + 16.0, card.y + 16.0, logo_side * aspect, logo_side),
            logo.id,
            1.0,
        );
    }

    let text_x = card.x + logo_side + 32.0;
    builder
        .with_z_order(z_order::TEXT)
        .push_clip(card)
        .text(
            "TGFX",
            Point::new(text_x, card.y + 16.0),
            TextStyle {
                font_size: 28.0,
                color: Color::rgb(0.1, 0.1, 0.12),
                font_family: None,
            },
        )
        .text(
            "display list / tiles / blur",
            Point::new(text_x, card.y + 56.0),
            TextStyle {
                font_size: 14.0,
                color: Color::rgb(0.2, 0.2, 0.24),
                font_family: None,
            },
        )
        .pop_clip()
        .build()
}

const GRID_COLUMNS: u32 = 6;
const GRID_ROWS: u32 = 4;
const GRID_GAP: f32 = 12.0;

/// Animated scene: a card grid with a highlight that walks one card per tick.
fn motion(ctx: &SceneContext<'_>) -> DisplayList {
    let (w, h) = ctx.size();
    let mut builder = DisplayListBuilder::new()
        .with_z_order(z_order::BACKGROUND)
        .rectangle(Rectangle::new(0.0, 0.0, w, h), DrawStyle::fill(ctx.background))
        .with_z_order(z_order::SHAPES);

    let card_w = (w - GRID_GAP * (GRID_COLUMNS + 1) as f32) / GRID_COLUMNS as f32;
    let card_h = (h - 40.0 - GRID_GAP * (GRID_ROWS + 1) as f32) / GRID_ROWS as f32;
    let card_rect = |index: u32| {
        let col = index % GRID_COLUMNS;
        let row = index / GRID_COLUMNS;
        Rectangle::new(
            GRID_GAP + col as f32 * (card_w + GRID_GAP),
            GRID_GAP + row as f32 * (card_h + GRID_GAP),
            card_w,
            card_h,
        )
    };

    let count = GRID_COLUMNS * GRID_ROWS;
    for index in 0..count {
        let t = index as f32 / count as f32;
        builder = builder.rounded_rectangle(
            card_rect(index),
            8.0,
            DrawStyle::fill(Color::rgb(0.3 + 0.5 * t, 0.5, 0.9 - 0.5 * t)),
        );
    }

    let highlighted = (ctx.tick % count as u64) as u32;
    let track = (w - GRID_GAP * 2.0).max(1.0);
    let dot_x = GRID_GAP + (ctx.tick as f32 * 23.0) % track;

    builder
        .with_z_order(z_order::HIGHLIGHT)
        .rounded_rectangle(
            card_rect(highlighted).expand(4.0),
            10.0,
            DrawStyle::stroke(Color::rgb(1.0, 0.6, 0.1), 3.0),
        )
        .circle(
            Point::new(dot_x, h - 20.0),
            8.0,
            DrawStyle::fill(Color::rgb(1.0, 0.6, 0.1)),
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dl_rendering::diff_bounds;
    use dl_settings::Settings;

    fn state(draw_index: u32) -> ViewState {
        let mut state = ViewState::new(600, 400, &Settings::default());
        state.viewport.draw_index = draw_index;
        state
    }

    fn build(state: &ViewState, tick: u64) -> DisplayList {
        DemoScenes.build(&SceneContext {
            state,
            tick,
            background: Color::WHITE,
            blur_radius: 12.0,
        })
    }

    #[test]
    fn gallery_is_static() {
        let state = state(0);
        assert!(diff_bounds(&build(&state, 1), &build(&state, 2)).is_empty());
        assert_eq!(build(&state, 0).max_blur_radius(), 12.0);
    }

    #[test]
    fn motion_damage_is_local() {
        let state = state(1);
        let damage = diff_bounds(&build(&state, 1), &build(&state, 2));

        assert!(!damage.is_empty());
        let area: f32 = damage.iter().map(Rectangle::area).sum();
        assert!(area < 600.0 * 400.0 / 4.0);
    }

    #[test]
    fn draw_index_wraps() {
        assert_eq!(scene_name(0), "gallery");
        assert_eq!(scene_name(3), "motion");
        assert_eq!(build(&state(2), 0), build(&state(0), 0));
    }
}
