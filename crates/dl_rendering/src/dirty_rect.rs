use crate::types::Rectangle;

/// 合并后保留的脏区域上限，超过后退化为一个外接矩形
pub const MAX_DIRTY_REGIONS: usize = 16;

/// 脏区域追踪器
///
/// 收集自上一帧以来失效的区域，并提供合并后的脏矩形用于剪裁渲染。
/// 所有区域在加入时都会被裁剪到视图范围内，范围外的部分永远不会被记录。
#[derive(Debug, Default, Clone)]
pub struct DirtyRegionTracker {
    /// 脏区域列表（已裁剪、互不重叠）
    dirty_regions: Vec<Rectangle>,
    /// 是否需要全屏重绘
    full_redraw: bool,
    /// 视图尺寸
    bounds: (f32, f32),
}

impl DirtyRegionTracker {
    /// 创建新的脏区域追踪器
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            dirty_regions: Vec::new(),
            full_redraw: false,
            bounds: (width, height),
        }
    }

    /// 设置视图尺寸
    ///
    /// 尺寸变化后旧区域不再可信，直接标记全屏重绘。
    pub fn set_bounds(&mut self, width: f32, height: f32) {
        if self.bounds != (width, height) {
            self.bounds = (width, height);
            self.mark_full_redraw();
        }
    }

    /// 获取视图范围矩形
    pub fn bounds(&self) -> Rectangle {
        Rectangle::new(0.0, 0.0, self.bounds.0, self.bounds.1)
    }

    /// 标记区域为脏
    ///
    /// 区域先裁剪到视图范围并向外取整；完全落在范围外的区域被忽略。
    pub fn mark_dirty(&mut self, rect: Rectangle) {
        // 如果已经需要全屏重绘，不需要再添加
        if self.full_redraw {
            return;
        }

        let Some(mut clipped) = self.clip_to_bounds(rect.round_out()) else {
            return;
        };

        // 与现有区域重叠时合并，合并结果可能又与其它区域重叠，所以循环直到稳定
        loop {
            let Some(index) = self
                .dirty_regions
                .iter()
                .position(|existing| existing.intersects(&clipped))
            else {
                break;
            };
            let existing = self.dirty_regions.swap_remove(index);
            clipped = existing.union(&clipped);
        }

        self.dirty_regions.push(clipped);

        if self.dirty_regions.len() > MAX_DIRTY_REGIONS {
            if let Some(combined) = self.get_combined_dirty_rect() {
                self.dirty_regions.clear();
                self.dirty_regions.push(combined);
            }
        }
    }

    /// 标记需要全屏重绘
    pub fn mark_full_redraw(&mut self) {
        self.full_redraw = true;
        self.dirty_regions.clear();
    }

    /// 检查是否需要全屏重绘
    pub fn needs_full_redraw(&self) -> bool {
        self.full_redraw
    }

    /// 获取合并后的脏矩形
    ///
    /// 返回 None 表示没有脏区域，返回 Some 表示需要重绘的区域。
    /// 如果是全屏重绘，返回整个视图区域。
    pub fn get_combined_dirty_rect(&self) -> Option<Rectangle> {
        if self.full_redraw {
            return self.clip_to_bounds(self.bounds());
        }

        let (first, rest) = self.dirty_regions.split_first()?;
        Some(rest.iter().fold(*first, |acc, rect| acc.union(rect)))
    }

    /// 获取需要重绘的区域列表
    ///
    /// 全屏重绘时返回整个视图区域。
    pub fn regions(&self) -> Vec<Rectangle> {
        if self.full_redraw {
            return self.clip_to_bounds(self.bounds()).into_iter().collect();
        }
        self.dirty_regions.clone()
    }

    /// 扩展与给定矩形相交的脏区域，使其完整覆盖该矩形
    ///
    /// 用于模糊等需要读取周边像素的绘制命令。
    pub fn expand_to_cover(&mut self, rect: Rectangle) {
        if self.full_redraw {
            return;
        }
        if self.dirty_regions.iter().any(|dirty| dirty.intersects(&rect)) {
            self.mark_dirty(rect);
        }
    }

    /// 清空脏区域追踪
    pub fn clear(&mut self) {
        self.dirty_regions.clear();
        self.full_redraw = false;
    }

    /// 检查是否有脏区域
    pub fn is_dirty(&self) -> bool {
        self.full_redraw || !self.dirty_regions.is_empty()
    }

    /// 裁剪矩形到视图范围内，结果为空时返回 None
    pub fn clip_to_bounds(&self, rect: Rectangle) -> Option<Rectangle> {
        rect.intersection(&self.bounds())
    }
}

/// 脏区域类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyType {
    /// 全屏重绘
    Full,
    /// 局部重绘
    Partial,
    /// 无需重绘
    None,
}

impl DirtyRegionTracker {
    /// 获取脏区域类型
    pub fn dirty_type(&self) -> DirtyType {
        if self.full_redraw {
            DirtyType::Full
        } else if !self.dirty_regions.is_empty() {
            DirtyType::Partial
        } else {
            DirtyType::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DirtyRegionTracker, DirtyType, MAX_DIRTY_REGIONS};
    use crate::types::Rectangle;

    #[test]
    fn test_mark_dirty() {
        let mut tracker = DirtyRegionTracker::new(1920.0, 1080.0);

        tracker.mark_dirty(Rectangle::new(10.0, 10.0, 100.0, 100.0));
        assert!(tracker.is_dirty());
        assert_eq!(tracker.dirty_type(), DirtyType::Partial);
    }

    #[test]
    fn test_mark_full_redraw() {
        let mut tracker = DirtyRegionTracker::new(1920.0, 1080.0);

        tracker.mark_full_redraw();
        assert!(tracker.needs_full_redraw());
        assert_eq!(tracker.dirty_type(), DirtyType::Full);

        let combined = tracker.get_combined_dirty_rect().unwrap();
        assert_eq!(combined, Rectangle::new(0.0, 0.0, 1920.0, 1080.0));
    }

    #[test]
    fn test_regions_are_clipped_to_bounds() {
        let mut tracker = DirtyRegionTracker::new(100.0, 100.0);

        tracker.mark_dirty(Rectangle::new(-20.0, 80.0, 50.0, 50.0));
        tracker.mark_dirty(Rectangle::new(500.0, 500.0, 10.0, 10.0));

        let regions = tracker.regions();
        assert_eq!(regions, vec![Rectangle::new(0.0, 80.0, 30.0, 20.0)]);
        for region in regions {
            assert!(tracker.bounds().contains_rect(&region));
        }
    }

    #[test]
    fn test_overlapping_regions_merge_transitively() {
        let mut tracker = DirtyRegionTracker::new(1000.0, 1000.0);

        tracker.mark_dirty(Rectangle::new(0.0, 0.0, 10.0, 10.0));
        tracker.mark_dirty(Rectangle::new(100.0, 0.0, 10.0, 10.0));
        // 桥接两个区域
        tracker.mark_dirty(Rectangle::new(5.0, 0.0, 100.0, 5.0));

        assert_eq!(
            tracker.regions(),
            vec![Rectangle::new(0.0, 0.0, 110.0, 10.0)]
        );
    }

    #[test]
    fn test_region_count_is_bounded() {
        let mut tracker = DirtyRegionTracker::new(10_000.0, 100.0);

        for i in 0..(MAX_DIRTY_REGIONS + 4) {
            tracker.mark_dirty(Rectangle::new(i as f32 * 20.0, 0.0, 5.0, 5.0));
        }

        assert!(tracker.regions().len() <= MAX_DIRTY_REGIONS);
    }

    #[test]
    fn test_shrinking_bounds_marks_full_redraw() {
        let mut tracker = DirtyRegionTracker::new(200.0, 200.0);
        tracker.mark_dirty(Rectangle::new(150.0, 150.0, 40.0, 40.0));

        tracker.set_bounds(100.0, 100.0);

        assert_eq!(tracker.dirty_type(), DirtyType::Full);
        assert_eq!(
            tracker.regions(),
            vec![Rectangle::new(0.0, 0.0, 100.0, 100.0)]
        );
    }

    #[test]
    fn test_expand_to_cover() {
        let mut tracker = DirtyRegionTracker::new(500.0, 500.0);
        tracker.mark_dirty(Rectangle::new(10.0, 10.0, 10.0, 10.0));

        tracker.expand_to_cover(Rectangle::new(0.0, 0.0, 100.0, 100.0));
        tracker.expand_to_cover(Rectangle::new(300.0, 300.0, 50.0, 50.0));

        assert_eq!(
            tracker.regions(),
            vec![Rectangle::new(0.0, 0.0, 100.0, 100.0)]
        );
    }

    #[test]
    fn test_clear() {
        let mut tracker = DirtyRegionTracker::new(1920.0, 1080.0);

        tracker.mark_full_redraw();
        tracker.clear();

        assert!(!tracker.is_dirty());
        assert_eq!(tracker.dirty_type(), DirtyType::None);
    }
}
