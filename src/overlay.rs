// 该文件是 Kanjian （看见） 项目的一部分。
// src/overlay.rs - 检测结果叠加层渲染
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! 将原图像素坐标下的检测框映射到显示表面。
//!
//! 渲染是纯函数 `(几何, 检测列表) -> 绘制指令`，任何输入变化都重新调用，
//! 不维护脏标记。

use crate::detection::DetectionRecord;

mod view;
pub use self::view::OverlayView;

// 文本渲染常量
pub const LINE_WIDTH: f32 = 2.0;
pub const LABEL_FONT_PX: f32 = 12.0;
pub const LABEL_TEXT_HEIGHT: f32 = 14.0;
pub const LABEL_PADDING: f32 = 4.0;
pub const LABEL_TEXT_OFFSET: f32 = 2.0;
pub const LABEL_ALPHA: f32 = 0.9;
const LABEL_CHAR_WIDTH: f32 = 7.0; // 12px 字体每字符平均宽度（粗略估计）

pub const PALETTE: [Color; 6] = [
  Color::rgb(0x2E, 0x7D, 0x32),
  Color::rgb(0x15, 0x65, 0xC0),
  Color::rgb(0x6A, 0x1B, 0x9A),
  Color::rgb(0xC6, 0x28, 0x28),
  Color::rgb(0xEF, 0x6C, 0x00),
  Color::rgb(0x00, 0x83, 0x8F),
];

pub const LABEL_TEXT_COLOR: Color = Color::rgb(0xFF, 0xFF, 0xFF);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 3]);

impl Color {
  pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
    Color([r, g, b])
  }
}

/// 按列表位置取色，与类别无关
pub fn palette(index: usize) -> Color {
  PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
  pub width: u32,
  pub height: u32,
}

impl Size {
  pub const ZERO: Size = Size {
    width: 0,
    height: 0,
  };

  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

/// 原图尺寸与显示尺寸
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ImageGeometry {
  pub native: Size,
  pub display: Size,
}

impl ImageGeometry {
  pub const fn new(native: Size, display: Size) -> Self {
    Self { native, display }
  }

  /// 水平与垂直方向各自独立的缩放系数；任一尺寸为 0 时无法绘制
  pub fn scale(&self) -> Option<(f32, f32)> {
    if self.native.is_empty() || self.display.is_empty() {
      return None;
    }
    Some((
      self.display.width as f32 / self.native.width as f32,
      self.display.height as f32 / self.native.height as f32,
    ))
  }

  /// 缩放并把每个坐标钳制到 `[0, 显示宽]` / `[0, 显示高]`
  pub fn project(&self, bbox: [f32; 4]) -> Option<[f32; 4]> {
    let (sx, sy) = self.scale()?;
    let w = self.display.width as f32;
    let h = self.display.height as f32;
    let clamp = |v: f32, max: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, max) };
    Some([
      clamp(bbox[0] * sx, w),
      clamp(bbox[1] * sy, h),
      clamp(bbox[2] * sx, w),
      clamp(bbox[3] * sy, h),
    ])
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Rect {
  pub fn right(&self) -> f32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> f32 {
    self.y + self.height
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
  StrokeRect {
    rect: Rect,
    color: Color,
    line_width: f32,
  },
  FillRect {
    rect: Rect,
    color: Color,
    alpha: f32,
  },
  Text {
    x: f32,
    y: f32,
    text: String,
    color: Color,
    font_px: f32,
  },
}

/// 一帧叠加层：透明表面尺寸与按顺序执行的绘制指令
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayFrame {
  pub size: Size,
  pub commands: Vec<DrawCommand>,
}

impl OverlayFrame {
  pub fn empty(size: Size) -> Self {
    Self {
      size,
      commands: Vec::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.commands.is_empty()
  }

  pub fn boxes(&self) -> impl Iterator<Item = &Rect> {
    self.commands.iter().filter_map(|cmd| match cmd {
      DrawCommand::StrokeRect { rect, .. } => Some(rect),
      _ => None,
    })
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.commands.iter().filter_map(|cmd| match cmd {
      DrawCommand::Text { text, .. } => Some(text.as_str()),
      _ => None,
    })
  }
}

/// 标签文本宽度测量
pub trait TextMetrics {
  fn text_width(&self, text: &str) -> f32;
}

/// 按平均字符宽度估算，不依赖字体
#[derive(Debug, Clone, Copy)]
pub struct EstimatedMetrics {
  pub char_width: f32,
}

impl Default for EstimatedMetrics {
  fn default() -> Self {
    Self {
      char_width: LABEL_CHAR_WIDTH,
    }
  }
}

impl TextMetrics for EstimatedMetrics {
  fn text_width(&self, text: &str) -> f32 {
    text.chars().count() as f32 * self.char_width
  }
}

impl<M: TextMetrics + ?Sized> TextMetrics for &M {
  fn text_width(&self, text: &str) -> f32 {
    (**self).text_width(text)
  }
}

/// 生成叠加层绘制指令
///
/// 跳过坐标不是 4 个有限数值的框，以及 `x2 < x1` 或 `y2 < y1` 的倒置框；
/// 超出原图范围（含负数）的坐标在缩放后钳制到显示表面内。
pub fn render_overlay<M: TextMetrics>(
  geometry: &ImageGeometry,
  detections: &[DetectionRecord],
  metrics: &M,
) -> OverlayFrame {
  let mut frame = OverlayFrame::empty(geometry.display);
  if detections.is_empty() || geometry.scale().is_none() {
    return frame;
  }

  for (index, detection) in detections.iter().enumerate() {
    let Some(bbox) = detection.corners() else {
      continue;
    };
    if bbox[2] < bbox[0] || bbox[3] < bbox[1] {
      continue;
    }
    let Some([x1, y1, x2, y2]) = geometry.project(bbox) else {
      continue;
    };

    let color = palette(index);
    frame.commands.push(DrawCommand::StrokeRect {
      rect: Rect {
        x: x1,
        y: y1,
        width: (x2 - x1).max(1.0),
        height: (y2 - y1).max(1.0),
      },
      color,
      line_width: LINE_WIDTH,
    });

    // 标签底板位于框上方，框贴近顶部时钳制到表面顶端
    let label = detection.label();
    let plaque_y = (y1 - LABEL_TEXT_HEIGHT - LABEL_PADDING).max(0.0);
    frame.commands.push(DrawCommand::FillRect {
      rect: Rect {
        x: x1,
        y: plaque_y,
        width: metrics.text_width(&label) + LABEL_PADDING * 2.0,
        height: LABEL_TEXT_HEIGHT + LABEL_PADDING,
      },
      color,
      alpha: LABEL_ALPHA,
    });
    frame.commands.push(DrawCommand::Text {
      x: x1 + LABEL_PADDING,
      y: plaque_y + LABEL_TEXT_OFFSET,
      text: label,
      color: LABEL_TEXT_COLOR,
      font_px: LABEL_FONT_PX,
    });
  }

  frame
}
