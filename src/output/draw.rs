// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/draw.rs - 叠加层光栅化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgba, RgbaImage, imageops};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use thiserror::Error;
use tracing::{debug, warn};

use crate::overlay::{
  Color, DrawCommand, EstimatedMetrics, LABEL_FONT_PX, OverlayFrame, Rect, TextMetrics,
};

#[derive(Error, Debug)]
pub enum OverlayRasterError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法解析字体文件: {0}")]
  InvalidFont(String),
}

/// 把绘制指令画到透明 RGBA 表面上
///
/// 没有字体时仍绘制边框与标签底板，只跳过文字。
#[derive(Default)]
pub struct OverlayRasterizer {
  font: Option<FontArc>,
  fallback: EstimatedMetrics,
}

fn rgba(color: Color, alpha: f32) -> Rgba<u8> {
  let [r, g, b] = color.0;
  Rgba([r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8])
}

// 向下取整起点，尺寸至少 1 像素
fn pixel_rect(rect: &Rect, inset: i32) -> Option<imageproc::rect::Rect> {
  let width = rect.width.round() as i32 - 2 * inset;
  let height = rect.height.round() as i32 - 2 * inset;
  if width <= 0 || height <= 0 {
    return None;
  }
  Some(
    imageproc::rect::Rect::at(rect.x.floor() as i32 + inset, rect.y.floor() as i32 + inset)
      .of_size(width as u32, height as u32),
  )
}

impl OverlayRasterizer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_font(font: FontArc) -> Self {
    Self {
      font: Some(font),
      fallback: EstimatedMetrics::default(),
    }
  }

  pub fn from_font_file(path: &Path) -> Result<Self, OverlayRasterError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)
      .map_err(|_| OverlayRasterError::InvalidFont(path.display().to_string()))?;
    debug!("加载字体: {}", path.display());
    Ok(Self::with_font(font))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn rasterize(&self, frame: &OverlayFrame) -> RgbaImage {
    let mut canvas = RgbaImage::new(frame.size.width, frame.size.height);
    if frame.size.is_empty() {
      return canvas;
    }

    for command in &frame.commands {
      match command {
        DrawCommand::StrokeRect {
          rect,
          color,
          line_width,
        } => {
          // 线宽 n 由 n 个逐层内缩的空心矩形组成
          let layers = line_width.round().max(1.0) as i32;
          for inset in 0..layers {
            if let Some(r) = pixel_rect(rect, inset) {
              draw_hollow_rect_mut(&mut canvas, r, rgba(*color, 1.0));
            }
          }
        }
        DrawCommand::FillRect { rect, color, alpha } => {
          if let Some(r) = pixel_rect(rect, 0) {
            draw_filled_rect_mut(&mut canvas, r, rgba(*color, *alpha));
          }
        }
        DrawCommand::Text {
          x,
          y,
          text,
          color,
          font_px,
        } => {
          if let Some(font) = &self.font {
            draw_text_mut(
              &mut canvas,
              rgba(*color, 1.0),
              x.round() as i32,
              y.round() as i32,
              PxScale::from(*font_px),
              font,
              text,
            );
          }
        }
      }
    }

    canvas
  }

  /// 把原图缩放到显示尺寸并叠加
  pub fn compose(&self, image: &DynamicImage, frame: &OverlayFrame) -> RgbaImage {
    if frame.size.is_empty() {
      warn!("显示尺寸为空，输出原图");
      return image.to_rgba8();
    }
    let mut base = imageops::resize(
      &image.to_rgba8(),
      frame.size.width,
      frame.size.height,
      imageops::FilterType::Triangle,
    );
    let overlay = self.rasterize(frame);
    imageops::overlay(&mut base, &overlay, 0, 0);
    base
  }
}

impl TextMetrics for OverlayRasterizer {
  fn text_width(&self, text: &str) -> f32 {
    match &self.font {
      Some(font) => text_size(PxScale::from(LABEL_FONT_PX), font, text).0 as f32,
      None => self.fallback.text_width(text),
    }
  }
}
