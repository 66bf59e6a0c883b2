use std::collections::HashMap;

use crate::types::Rectangle;

/// 瓦片坐标（列、行），以瓦片为单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub col: i32,
    pub row: i32,
}

impl TileCoord {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

/// 缓存条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// 缓存有效
    Valid,
    /// 缓存无效，需要重绘
    Invalid,
    /// 缓存不存在
    Missing,
}

#[derive(Debug)]
struct TileEntry<T> {
    payload: T,
    valid: bool,
    last_used: u64,
}

/// 瓦片缓存管理器
///
/// 按固定尺寸把图层空间切分为瓦片，每个瓦片可以独立失效和重绘。
/// 缓存数量超过容量时淘汰最久未使用的瓦片。
/// 瓦片内容类型由渲染后端决定（例如位图）。
#[derive(Debug)]
pub struct TileCache<T> {
    tiles: HashMap<TileCoord, TileEntry<T>>,
    /// 瓦片边长（像素）
    tile_size: u32,
    /// 最大缓存瓦片数
    capacity: usize,
    /// 使用计数，用于 LRU 淘汰
    clock: u64,
}

impl<T> TileCache<T> {
    /// 创建新的瓦片缓存管理器
    pub fn new(tile_size: u32, capacity: usize) -> Self {
        Self {
            tiles: HashMap::new(),
            tile_size: tile_size.max(1),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// 获取瓦片边长
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// 设置瓦片边长
    ///
    /// 边长变化会清除所有缓存
    pub fn set_tile_size(&mut self, tile_size: u32) {
        let tile_size = tile_size.max(1);
        if self.tile_size != tile_size {
            self.tile_size = tile_size;
            self.clear_all();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// 获取瓦片在图层空间中的矩形
    pub fn tile_rect(&self, coord: TileCoord) -> Rectangle {
        let size = self.tile_size as f32;
        Rectangle::new(coord.col as f32 * size, coord.row as f32 * size, size, size)
    }

    /// 获取与矩形相交的所有瓦片坐标（按行优先排列）
    pub fn tiles_in_rect(&self, rect: Rectangle) -> Vec<TileCoord> {
        if rect.is_empty() {
            return Vec::new();
        }
        let size = self.tile_size as f32;
        let first_col = (rect.x / size).floor() as i32;
        let first_row = (rect.y / size).floor() as i32;
        let last_col = (rect.right() / size).ceil() as i32;
        let last_row = (rect.bottom() / size).ceil() as i32;

        let mut coords = Vec::new();
        for row in first_row..last_row {
            for col in first_col..last_col {
                coords.push(TileCoord::new(col, row));
            }
        }
        coords
    }

    /// 获取指定瓦片的缓存状态
    pub fn get_state(&self, coord: TileCoord) -> CacheState {
        match self.tiles.get(&coord) {
            Some(entry) if entry.valid => CacheState::Valid,
            Some(_) => CacheState::Invalid,
            None => CacheState::Missing,
        }
    }

    /// 检查指定瓦片是否有效
    pub fn is_valid(&self, coord: TileCoord) -> bool {
        self.get_state(coord) == CacheState::Valid
    }

    /// 获取有效瓦片内容，并刷新其使用时间
    pub fn get(&mut self, coord: TileCoord) -> Option<&T> {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.tiles.get_mut(&coord).filter(|entry| entry.valid)?;
        entry.last_used = clock;
        Some(&entry.payload)
    }

    /// 写入瓦片内容并标记为有效
    pub fn insert(&mut self, coord: TileCoord, payload: T) {
        self.clock += 1;
        self.tiles.insert(
            coord,
            TileEntry {
                payload,
                valid: true,
                last_used: self.clock,
            },
        );
    }

    /// 取出瓦片内容（无论是否有效），便于复用内存
    pub fn take(&mut self, coord: TileCoord) -> Option<T> {
        self.tiles.remove(&coord).map(|entry| entry.payload)
    }

    /// 使指定瓦片失效
    pub fn invalidate(&mut self, coord: TileCoord) {
        if let Some(entry) = self.tiles.get_mut(&coord) {
            entry.valid = false;
        }
    }

    /// 使与矩形相交的瓦片失效
    pub fn invalidate_rect(&mut self, rect: Rectangle) {
        for coord in self.tiles_in_rect(rect) {
            self.invalidate(coord);
        }
    }

    /// 使所有瓦片失效
    pub fn invalidate_all(&mut self) {
        for entry in self.tiles.values_mut() {
            entry.valid = false;
        }
    }

    /// 清除所有缓存
    pub fn clear_all(&mut self) {
        self.tiles.clear();
    }

    /// 获取给定范围内所有无效或缺失的瓦片（按行优先排列）
    pub fn get_invalid_tiles(&self, rect: Rectangle) -> Vec<TileCoord> {
        self.tiles_in_rect(rect)
            .into_iter()
            .filter(|&coord| !self.is_valid(coord))
            .collect()
    }

    /// 淘汰超出容量的瓦片
    ///
    /// 优先淘汰最久未使用的瓦片；`keep` 中的瓦片不会被淘汰。
    /// 返回被淘汰的瓦片坐标。
    pub fn evict_to_capacity(&mut self, keep: &[TileCoord]) -> Vec<TileCoord> {
        if self.tiles.len() <= self.capacity {
            return Vec::new();
        }

        let mut candidates: Vec<(u64, TileCoord)> = self
            .tiles
            .iter()
            .filter(|(coord, _)| !keep.contains(coord))
            .map(|(coord, entry)| (entry.last_used, *coord))
            .collect();
        candidates.sort_unstable();

        let excess = self.tiles.len() - self.capacity;
        let evicted: Vec<TileCoord> = candidates
            .into_iter()
            .take(excess)
            .map(|(_, coord)| coord)
            .collect();
        for coord in &evicted {
            self.tiles.remove(coord);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheState, TileCache, TileCoord};
    use crate::types::Rectangle;

    #[test]
    fn test_tiles_in_rect() {
        let cache: TileCache<()> = TileCache::new(100, 16);

        let coords = cache.tiles_in_rect(Rectangle::new(50.0, 0.0, 100.0, 100.0));
        assert_eq!(coords, vec![TileCoord::new(0, 0), TileCoord::new(1, 0)]);

        // 负坐标同样按 floor 计算
        let coords = cache.tiles_in_rect(Rectangle::new(-10.0, -10.0, 20.0, 20.0));
        assert_eq!(coords.len(), 4);
        assert!(coords.contains(&TileCoord::new(-1, -1)));
    }

    #[test]
    fn test_cache_state() {
        let mut cache = TileCache::new(64, 16);
        let coord = TileCoord::new(0, 0);

        // 初始状态为 Missing
        assert_eq!(cache.get_state(coord), CacheState::Missing);

        // 写入后变为 Valid
        cache.insert(coord, 1u32);
        assert_eq!(cache.get_state(coord), CacheState::Valid);

        // 失效后变为 Invalid，且不能再读取
        cache.invalidate(coord);
        assert_eq!(cache.get_state(coord), CacheState::Invalid);
        assert!(cache.get(coord).is_none());

        // 取出内容复用
        assert_eq!(cache.take(coord), Some(1));
        assert_eq!(cache.get_state(coord), CacheState::Missing);
    }

    #[test]
    fn test_tile_size_change_clears_all() {
        let mut cache = TileCache::new(64, 16);
        cache.insert(TileCoord::new(0, 0), ());
        cache.insert(TileCoord::new(1, 0), ());

        cache.set_tile_size(128);

        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_rect() {
        let mut cache = TileCache::new(100, 16);
        cache.insert(TileCoord::new(0, 0), ());
        cache.insert(TileCoord::new(1, 0), ());
        cache.insert(TileCoord::new(2, 0), ());

        cache.invalidate_rect(Rectangle::new(150.0, 10.0, 10.0, 10.0));

        assert!(cache.is_valid(TileCoord::new(0, 0)));
        assert!(!cache.is_valid(TileCoord::new(1, 0)));
        assert!(cache.is_valid(TileCoord::new(2, 0)));

        let invalid = cache.get_invalid_tiles(Rectangle::new(0.0, 0.0, 400.0, 100.0));
        assert_eq!(invalid, vec![TileCoord::new(1, 0), TileCoord::new(3, 0)]);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = TileCache::new(10, 2);
        cache.insert(TileCoord::new(0, 0), 'a');
        cache.insert(TileCoord::new(1, 0), 'b');
        cache.insert(TileCoord::new(2, 0), 'c');

        // 访问 a，使 b 成为最久未使用
        assert_eq!(cache.get(TileCoord::new(0, 0)), Some(&'a'));

        let evicted = cache.evict_to_capacity(&[]);

        assert_eq!(evicted, vec![TileCoord::new(1, 0)]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction_respects_keep_list() {
        let mut cache = TileCache::new(10, 1);
        cache.insert(TileCoord::new(0, 0), ());
        cache.insert(TileCoord::new(1, 0), ());

        let evicted = cache.evict_to_capacity(&[TileCoord::new(0, 0)]);

        assert_eq!(evicted, vec![TileCoord::new(1, 0)]);
        assert!(cache.is_valid(TileCoord::new(0, 0)));
    }
}
