// 该文件是 Kanjian （看见） 项目的一部分。
// src/input.rs - 图像文件输入
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

use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, overlay::Size, upload::ImageUpload};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 从 `image:///path` 读取的图像：保留原始字节用于上传，解码结果用于获取原图尺寸
pub struct ImageFileInput {
  upload: ImageUpload,
  image: DynamicImage,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = Path::new(url.path());
    let bytes = std::fs::read(path)?;
    let format = ImageFormat::from_path(path).or_else(|_| image::guess_format(&bytes))?;
    let image = image::load_from_memory_with_format(&bytes, format)?;
    debug!(
      "读取图像 {}: {}x{}, {}",
      path.display(),
      image.width(),
      image.height(),
      format.to_mime_type()
    );

    let filename = path.file_name().and_then(|name| name.to_str());
    Ok(ImageFileInput {
      upload: ImageUpload::new(filename, Some(format.to_mime_type()), bytes),
      image,
    })
  }
}

impl ImageFileInput {
  pub fn native_size(&self) -> Size {
    Size::new(self.image.width(), self.image.height())
  }

  pub fn upload(&self) -> &ImageUpload {
    &self.upload
  }

  pub fn into_parts(self) -> (ImageUpload, DynamicImage) {
    (self.upload, self.image)
  }
}
