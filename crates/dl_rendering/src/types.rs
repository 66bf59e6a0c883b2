/// 颜色定义（非预乘，0.0 ~ 1.0）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// 创建不透明颜色
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// 创建带透明度的颜色
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// 从 8 位分量创建不透明颜色
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// 转换为 8 位 RGBA 分量
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// 返回修改透明度后的颜色
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// 黑色
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    /// 白色
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    /// 透明
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

/// 点定义
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const ZERO: Point = Point::new(0.0, 0.0);
}

/// 矩形定义
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rectangle {
    /// 创建新的矩形
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 从左上角和右下角坐标创建矩形
    pub fn from_bounds(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// 获取右边界
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// 获取下边界
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// 宽或高不大于 0 时视为空矩形
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_empty() {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// 检查点是否在矩形内
    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// 检查是否完全包含另一个矩形
    pub fn contains_rect(&self, other: &Rectangle) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// 检查两个矩形是否相交
    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// 求交集，不相交时返回 None
    pub fn intersection(&self, other: &Rectangle) -> Option<Rectangle> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        let rect = Rectangle::from_bounds(left, top, right, bottom);
        (!rect.is_empty()).then_some(rect)
    }

    /// 合并两个矩形
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rectangle::from_bounds(left, top, right, bottom)
    }

    /// 扩展矩形
    pub fn expand(&self, margin: f32) -> Rectangle {
        Rectangle {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    /// 平移矩形
    pub fn translate(&self, dx: f32, dy: f32) -> Rectangle {
        Rectangle {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// 以原点为中心缩放矩形
    pub fn scale(&self, factor: f32) -> Rectangle {
        Rectangle {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// 向外取整到像素边界
    pub fn round_out(&self) -> Rectangle {
        Rectangle::from_bounds(
            self.x.floor(),
            self.y.floor(),
            self.right().ceil(),
            self.bottom().ceil(),
        )
    }

    /// 零矩形
    pub const ZERO: Rectangle = Rectangle::new(0.0, 0.0, 0.0, 0.0);
}

/// 文本样式
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Color,
    /// 为 None 时使用第一个注册的字体
    pub font_family: Option<String>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            color: Color::BLACK,
            font_family: None,
        }
    }
}

/// 绘制样式
#[derive(Debug, Clone, PartialEq)]
pub struct DrawStyle {
    pub stroke_color: Color,
    pub fill_color: Option<Color>,
    pub stroke_width: f32,
}

impl DrawStyle {
    /// 仅填充，无描边
    pub fn fill(color: Color) -> Self {
        Self {
            stroke_color: Color::TRANSPARENT,
            fill_color: Some(color),
            stroke_width: 0.0,
        }
    }

    /// 仅描边
    pub fn stroke(color: Color, width: f32) -> Self {
        Self {
            stroke_color: color,
            fill_color: None,
            stroke_width: width,
        }
    }

    /// 描边是否可见
    pub fn has_stroke(&self) -> bool {
        self.stroke_width > 0.0 && self.stroke_color.a > 0.0
    }
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            stroke_color: Color::BLACK,
            fill_color: None,
            stroke_width: 1.0,
        }
    }
}

/// 位图ID（由资源注册表分配的图片句柄）
pub type BitmapId = u64;
