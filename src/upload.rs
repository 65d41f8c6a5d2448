// 该文件是 Kanjian （看见） 项目的一部分。
// src/upload.rs - 上传图像载荷
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

use reqwest::multipart::{Form, Part};

/// multipart 表单中文件字段的名称
pub const FILE_FIELD: &str = "file";
pub const DEFAULT_FILENAME: &str = "image";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 一次请求内独占的图像数据，转发后即被消耗
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
  pub filename: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

impl ImageUpload {
  pub fn new(filename: Option<&str>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
    let filename = filename
      .filter(|name| !name.is_empty())
      .unwrap_or(DEFAULT_FILENAME);
    let content_type = content_type
      .filter(|ct| !ct.is_empty())
      .unwrap_or(DEFAULT_CONTENT_TYPE);
    Self {
      filename: filename.to_string(),
      content_type: content_type.to_string(),
      bytes,
    }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  pub fn is_image(&self) -> bool {
    self.content_type.starts_with("image/")
  }

  /// 重新编码为只含 `file` 字段的 multipart 表单，保留文件名与媒体类型
  pub fn into_form(self) -> Result<Form, reqwest::Error> {
    let part = Part::bytes(self.bytes)
      .file_name(self.filename)
      .mime_str(&self.content_type)?;
    Ok(Form::new().part(FILE_FIELD, part))
  }
}
