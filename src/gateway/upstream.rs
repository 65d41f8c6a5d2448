// 该文件是 Kanjian （看见） 项目的一部分。
// src/gateway/upstream.rs - 上游推理服务
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

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  detection::{DetectionRecord, parse_detections},
  is_http_scheme, join_segments,
  upload::ImageUpload,
};

pub const DEFAULT_PREDICT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
  /// 连接失败、DNS 错误或超时
  #[error("{0}")]
  Unreachable(String),
  /// 上游可达，但返回了非成功状态码
  #[error("Request failed with status code {status}")]
  Rejected { status: u16, body: Value },
}

impl From<reqwest::Error> for UpstreamError {
  fn from(err: reqwest::Error) -> Self {
    UpstreamError::Unreachable(err.to_string())
  }
}

/// 上游成功响应，状态码与 JSON 正文原样保留
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
  pub status: u16,
  pub body: Value,
}

impl UpstreamReply {
  pub fn detections(&self) -> Vec<DetectionRecord> {
    parse_detections(self.body.get("predictions"))
  }
}

/// 推理服务能力接口
pub trait Upstream {
  fn predict(
    &self,
    upload: ImageUpload,
  ) -> impl Future<Output = Result<UpstreamReply, UpstreamError>>;

  fn health(&self) -> impl Future<Output = Result<Value, UpstreamError>>;
}

/// 通过 HTTP 访问的上游推理服务
#[derive(Debug, Clone)]
pub struct HttpUpstream {
  client: Client,
  predict_url: Url,
  health_url: Url,
  predict_timeout: Duration,
  health_timeout: Duration,
}

#[derive(Error, Debug)]
pub enum HttpUpstreamError {
  #[error("上游地址必须使用 http 或 https 方案: {0}")]
  SchemeMismatch(String),
  #[error("上游地址不能作为基础地址: {0}")]
  InvalidBase(String),
  #[error("HTTP 客户端错误: {0}")]
  ClientError(#[from] reqwest::Error),
}

pub struct HttpUpstreamBuilder {
  base: Url,
  predict_timeout: Duration,
  health_timeout: Duration,
}

impl FromUrl for HttpUpstreamBuilder {
  type Error = HttpUpstreamError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !is_http_scheme(url) {
      return Err(HttpUpstreamError::SchemeMismatch(url.to_string()));
    }

    Ok(HttpUpstreamBuilder {
      base: url.clone(),
      predict_timeout: DEFAULT_PREDICT_TIMEOUT,
      health_timeout: DEFAULT_HEALTH_TIMEOUT,
    })
  }
}

impl HttpUpstreamBuilder {
  pub fn predict_timeout(mut self, timeout: Duration) -> Self {
    self.predict_timeout = timeout;
    self
  }

  pub fn health_timeout(mut self, timeout: Duration) -> Self {
    self.health_timeout = timeout;
    self
  }

  pub fn build(self) -> Result<HttpUpstream, HttpUpstreamError> {
    let invalid = || HttpUpstreamError::InvalidBase(self.base.to_string());
    let predict_url = join_segments(&self.base, &["predict"]).ok_or_else(invalid)?;
    let health_url = join_segments(&self.base, &["health"]).ok_or_else(invalid)?;

    info!("上游推理服务: {}", self.base);
    debug!(
      "推理超时: {:?}, 健康检查超时: {:?}",
      self.predict_timeout, self.health_timeout
    );

    Ok(HttpUpstream {
      client: Client::builder().build()?,
      predict_url,
      health_url,
      predict_timeout: self.predict_timeout,
      health_timeout: self.health_timeout,
    })
  }
}

impl HttpUpstream {
  pub fn predict_url(&self) -> &Url {
    &self.predict_url
  }

  pub fn health_url(&self) -> &Url {
    &self.health_url
  }
}

/// 读取响应正文；非 JSON 正文作为字符串保留
pub(crate) async fn read_body(response: Response) -> Result<Value, reqwest::Error> {
  let bytes = response.bytes().await?;
  if bytes.is_empty() {
    return Ok(Value::Null);
  }
  Ok(
    serde_json::from_slice(&bytes)
      .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
  )
}

impl Upstream for HttpUpstream {
  async fn predict(&self, upload: ImageUpload) -> Result<UpstreamReply, UpstreamError> {
    debug!(
      "转发到 {}: {} ({} 字节, {})",
      self.predict_url,
      upload.filename,
      upload.len(),
      upload.content_type
    );
    let form = upload.into_form()?;
    let response = self
      .client
      .post(self.predict_url.clone())
      .multipart(form)
      .timeout(self.predict_timeout)
      .send()
      .await?;

    let status = response.status();
    let body = read_body(response).await?;
    if !status.is_success() {
      return Err(UpstreamError::Rejected {
        status: status.as_u16(),
        body,
      });
    }

    Ok(UpstreamReply {
      status: status.as_u16(),
      body,
    })
  }

  async fn health(&self) -> Result<Value, UpstreamError> {
    let response = self
      .client
      .get(self.health_url.clone())
      .timeout(self.health_timeout)
      .send()
      .await?;

    let status = response.status();
    let body = read_body(response).await?;
    if !status.is_success() {
      return Err(UpstreamError::Rejected {
        status: status.as_u16(),
        body,
      });
    }
    Ok(body)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn endpoints_follow_base() {
    let base = Url::parse("http://localhost:5000").unwrap();
    let upstream = HttpUpstreamBuilder::from_url(&base).unwrap().build().unwrap();
    assert_eq!(upstream.predict_url().as_str(), "http://localhost:5000/predict");
    assert_eq!(upstream.health_url().as_str(), "http://localhost:5000/health");
  }

  #[test]
  fn rejects_non_http_base() {
    let base = Url::parse("ftp://localhost/").unwrap();
    assert!(matches!(
      HttpUpstreamBuilder::from_url(&base),
      Err(HttpUpstreamError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn rejected_message_names_status() {
    let err = UpstreamError::Rejected {
      status: 503,
      body: json!({"error": "busy"}),
    };
    assert_eq!(err.to_string(), "Request failed with status code 503");
  }

  #[test]
  fn reply_exposes_detections() {
    let reply = UpstreamReply {
      status: 200,
      body: json!({"success": true, "predictions": [{"class": 1, "confidence": 0.5, "bbox": [0, 0, 1, 1]}]}),
    };
    assert_eq!(reply.detections(), vec![DetectionRecord::new(1, 0.5, [0.0, 0.0, 1.0, 1.0])]);
  }
}
