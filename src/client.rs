// 该文件是 Kanjian （看见） 项目的一部分。
// src/client.rs - 网关客户端
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

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl,
  detection::{DetectionRecord, parse_detections},
  gateway::{PREDICTION_FAILED, read_body},
  is_http_scheme, join_segments,
  upload::ImageUpload,
};

pub const NOT_AN_IMAGE_MESSAGE: &str = "Please select a valid image file (png/jpg).";

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("{}", NOT_AN_IMAGE_MESSAGE)]
  NotAnImage,
  /// 网关返回的 `error` 字段，按纯文本呈现
  #[error("{0}")]
  Rejected(String),
  #[error("网关请求失败: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("网关地址必须使用 http 或 https 方案: {0}")]
  SchemeMismatch(String),
}

/// 网关 `/api/predict` 与 `/api/health` 的客户端
#[derive(Debug, Clone)]
pub struct GatewayClient {
  client: Client,
  predict_url: Url,
  health_url: Url,
}

impl FromUrl for GatewayClient {
  type Error = ClientError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let mismatch = || ClientError::SchemeMismatch(url.to_string());
    if !is_http_scheme(url) {
      return Err(mismatch());
    }

    Ok(GatewayClient {
      client: Client::builder().build()?,
      predict_url: join_segments(url, &["api", "predict"]).ok_or_else(mismatch)?,
      health_url: join_segments(url, &["api", "health"]).ok_or_else(mismatch)?,
    })
  }
}

/// 提取信封中的错误文本：字符串原样，其他值序列化为 JSON
pub fn error_text(body: &Value) -> String {
  match body.get("error") {
    Some(Value::String(text)) => text.clone(),
    Some(Value::Null) | None => PREDICTION_FAILED.to_string(),
    Some(other) => other.to_string(),
  }
}

impl GatewayClient {
  /// 上传图像并返回检测列表；非图像文件在本地被拒绝，不会发出请求
  pub async fn predict(&self, upload: ImageUpload) -> Result<Vec<DetectionRecord>, ClientError> {
    if !upload.is_image() {
      warn!("拒绝非图像文件: {} ({})", upload.filename, upload.content_type);
      return Err(ClientError::NotAnImage);
    }

    let response = self
      .client
      .post(self.predict_url.clone())
      .multipart(upload.into_form()?)
      .send()
      .await?;
    let status = response.status();
    let body = read_body(response).await?;

    if !status.is_success() || body.get("success") != Some(&Value::Bool(true)) {
      return Err(ClientError::Rejected(error_text(&body)));
    }

    let detections = parse_detections(body.get("predictions"));
    debug!("网关返回 {} 个检测结果", detections.len());
    Ok(detections)
  }

  /// 返回上游健康检查正文
  pub async fn health(&self) -> Result<Value, ClientError> {
    let response = self.client.get(self.health_url.clone()).send().await?;
    let mut body = read_body(response).await?;

    if body.get("ok") != Some(&Value::Bool(true)) {
      return Err(ClientError::Rejected(error_text(&body)));
    }
    Ok(body.get_mut("upstream").map(Value::take).unwrap_or(Value::Null))
  }
}

/// 检测请求的票据，越新的请求序号越大
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// 保存当前生效的检测结果；新请求开始后，旧请求的结果到达时被丢弃
#[derive(Debug, Default)]
pub struct PredictionSlot {
  latest: u64,
  detections: Option<Arc<[DetectionRecord]>>,
}

impl PredictionSlot {
  /// 开始一次新的检测，之前的结果立即失效
  pub fn begin(&mut self) -> Ticket {
    self.latest += 1;
    self.detections = None;
    Ticket(self.latest)
  }

  /// 仅当票据仍是最新时应用结果
  pub fn apply(&mut self, ticket: Ticket, detections: Vec<DetectionRecord>) -> bool {
    if ticket.0 != self.latest {
      debug!("丢弃过期的检测结果: {} < {}", ticket.0, self.latest);
      return false;
    }
    self.detections = Some(Arc::from(detections));
    true
  }

  pub fn current(&self) -> Option<&Arc<[DetectionRecord]>> {
    self.detections.as_ref()
  }

  /// 清空结果，例如用户重新选择图像时
  pub fn reset(&mut self) {
    self.begin();
  }
}
