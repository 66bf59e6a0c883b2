pub mod dirty_rect;
pub mod display_list;
pub mod tile_cache;
pub mod types;

// 重新导出常用类型
pub use dirty_rect::{DirtyRegionTracker, DirtyType};
pub use display_list::{
    DisplayList, DisplayListBuilder, DrawCommand, RenderBackend, TEXT_LINE_HEIGHT, diff_bounds,
    z_order,
};
pub use tile_cache::{CacheState, TileCache, TileCoord};
pub use types::{BitmapId, Color, DrawStyle, Point, Rectangle, TextStyle};
