// 该文件是 Kanjian （看见） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod client;
pub mod config;
pub mod detection;
pub mod gateway;
pub mod overlay;
pub mod upload;

#[cfg(feature = "save_overlay_image")]
pub mod input;
#[cfg(feature = "save_overlay_image")]
pub mod output;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// HTTP 服务地址允许的方案
pub(crate) fn is_http_scheme(url: &url::Url) -> bool {
  matches!(url.scheme(), "http" | "https")
}

/// 在基础地址后追加路径段，保留基础地址已有的路径前缀
pub(crate) fn join_segments(base: &url::Url, segments: &[&str]) -> Option<url::Url> {
  let mut url = base.clone();
  {
    let mut path = url.path_segments_mut().ok()?;
    path.pop_if_empty();
    path.extend(segments);
  }
  Some(url)
}
