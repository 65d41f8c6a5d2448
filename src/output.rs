// 该文件是 Kanjian （看见） 项目的一部分。
// src/output.rs - 叠加结果输出
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

use image::DynamicImage;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, overlay::OverlayFrame};

pub mod draw;

use self::draw::OverlayRasterizer;

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum SaveOverlayImageError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 把叠加后的图像保存到 `image:///path`
pub struct SaveOverlayImageOutput {
  path: String,
  rasterizer: OverlayRasterizer,
}

impl FromUrlWithScheme for SaveOverlayImageOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveOverlayImageOutput {
  type Error = SaveOverlayImageError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveOverlayImageError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveOverlayImageOutput {
      path: uri.path().to_string(),
      rasterizer: OverlayRasterizer::new(),
    })
  }
}

impl SaveOverlayImageOutput {
  pub fn with_rasterizer(mut self, rasterizer: OverlayRasterizer) -> Self {
    self.rasterizer = rasterizer;
    self
  }
}

impl Render<DynamicImage, OverlayFrame> for SaveOverlayImageOutput {
  type Error = SaveOverlayImageError;

  fn render_result(&self, frame: &DynamicImage, result: &OverlayFrame) -> Result<(), Self::Error> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let image = self.rasterizer.compose(frame, result);
    image.save(&self.path)?;

    warn!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::overlay::Size;

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("file:///tmp/out.png").unwrap();
    assert!(matches!(
      SaveOverlayImageOutput::from_url(&url),
      Err(SaveOverlayImageError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn saves_composited_image() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveOverlayImageOutput::from_url(&url).unwrap();

    let source = DynamicImage::new_rgb8(64, 48);
    output
      .render_result(&source, &OverlayFrame::empty(Size::new(32, 24)))
      .unwrap();

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (32, 24));
  }
}
