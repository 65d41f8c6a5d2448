// 该文件是 Kanjian （看见） 项目的一部分。
// src/gateway.rs - 推理网关
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

//! 接收上传图像，转发到上游推理服务，并把上游的成功或失败统一为稳定的 JSON 信封。

use actix_multipart::{Field, Multipart};
use actix_web::{HttpResponse, ResponseError, http::StatusCode, web};
use futures_util::StreamExt;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::upload::{FILE_FIELD, ImageUpload};

mod server;
mod upstream;

pub use self::server::serve;
pub use self::upstream::{
  DEFAULT_HEALTH_TIMEOUT, DEFAULT_PREDICT_TIMEOUT, HttpUpstream, HttpUpstreamBuilder,
  HttpUpstreamError, Upstream, UpstreamError, UpstreamReply,
};
pub(crate) use self::upstream::read_body;

/// 默认上传大小上限：15 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 15 * 1024 * 1024;

pub const MISSING_FILE_MESSAGE: &str = "No file provided (form field name must be \"file\")";
pub const PREDICTION_FAILED: &str = "Prediction failed";

#[derive(Error, Debug)]
pub enum GatewayError {
  #[error("{}", MISSING_FILE_MESSAGE)]
  MissingFile,
  #[error("{0}")]
  InvalidUpload(String),
  #[error("File exceeds the upload limit of {limit} bytes")]
  FileTooLarge { limit: usize },
  #[error(transparent)]
  Upstream(#[from] UpstreamError),
}

impl ResponseError for GatewayError {
  fn status_code(&self) -> StatusCode {
    match self {
      GatewayError::MissingFile | GatewayError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
      GatewayError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
      GatewayError::Upstream(UpstreamError::Unreachable(_)) => StatusCode::BAD_GATEWAY,
      GatewayError::Upstream(UpstreamError::Rejected { status, .. }) => {
        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let body = match self {
      GatewayError::Upstream(err) => {
        // 上游有正文时原样返回，否则使用错误信息
        let error = match err {
          UpstreamError::Rejected { body, .. } if !is_blank(body) => body.clone(),
          _ => Value::String(err.to_string()),
        };
        json!({ "success": false, "error": error, "message": PREDICTION_FAILED })
      }
      _ => json!({ "success": false, "error": self.to_string() }),
    };
    HttpResponse::build(self.status_code()).json(body)
  }
}

fn is_blank(body: &Value) -> bool {
  match body {
    Value::Null => true,
    Value::String(s) => s.is_empty(),
    _ => false,
  }
}

/// 网关共享状态：只读，跨请求共享
pub struct Gateway<U> {
  upstream: U,
  max_upload_bytes: usize,
}

impl<U: Upstream> Gateway<U> {
  pub fn new(upstream: U) -> Self {
    Self {
      upstream,
      max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
  }

  pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
    self.max_upload_bytes = max_upload_bytes;
    self
  }

  pub fn upstream(&self) -> &U {
    &self.upstream
  }

  pub fn max_upload_bytes(&self) -> usize {
    self.max_upload_bytes
  }

  /// 校验上传并转发到上游；缺少文件时不会访问上游
  pub async fn handle_predict(&self, payload: Multipart) -> Result<UpstreamReply, GatewayError> {
    let upload = read_upload(payload, self.max_upload_bytes()).await?;
    info!(
      "收到推理请求: {} ({} 字节, {})",
      upload.filename,
      upload.len(),
      upload.content_type
    );
    let reply = self.upstream().predict(upload).await.inspect_err(|err| {
      warn!("上游推理失败: {}", err);
    })?;
    info!(
      "上游推理完成，状态码: {}, 检测数: {}",
      reply.status,
      reply.detections().len()
    );
    Ok(reply)
  }
}

/// 从 multipart 请求中取出唯一的 `file` 文件字段
///
/// 只有带文件名的部分才算文件；同名的普通文本字段与其他字段一样被丢弃。
/// 出现第二个文件时整个请求被拒绝。
pub async fn read_upload(mut payload: Multipart, limit: usize) -> Result<ImageUpload, GatewayError> {
  let mut upload = None;

  while let Some(item) = payload.next().await {
    let mut field = item.map_err(|e| GatewayError::InvalidUpload(e.to_string()))?;

    let filename = field
      .content_disposition()
      .and_then(|cd| cd.get_filename())
      .map(str::to_owned);
    let is_file = field.name() == Some(FILE_FIELD) && filename.is_some();

    if !is_file {
      drain(&mut field).await?;
      continue;
    }
    if upload.is_some() {
      warn!("请求中有多个 {} 文件", FILE_FIELD);
      return Err(GatewayError::InvalidUpload(format!(
        "Unexpected field: only one \"{}\" file is accepted",
        FILE_FIELD
      )));
    }

    let content_type = field.content_type().map(|mime| mime.to_string());
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
      let chunk = chunk.map_err(|e| GatewayError::InvalidUpload(e.to_string()))?;
      if bytes.len() + chunk.len() > limit {
        warn!("上传文件超出大小限制: {} 字节", limit);
        return Err(GatewayError::FileTooLarge { limit });
      }
      bytes.extend_from_slice(&chunk);
    }

    upload = Some(ImageUpload::new(
      filename.as_deref(),
      content_type.as_deref(),
      bytes,
    ));
  }

  upload.ok_or_else(|| {
    warn!("请求中没有 {} 文件", FILE_FIELD);
    GatewayError::MissingFile
  })
}

async fn drain(field: &mut Field) -> Result<(), GatewayError> {
  while let Some(chunk) = field.next().await {
    chunk.map_err(|e| GatewayError::InvalidUpload(e.to_string()))?;
  }
  Ok(())
}

async fn predict<U: Upstream + 'static>(
  gateway: web::Data<Gateway<U>>,
  payload: Multipart,
) -> Result<HttpResponse, GatewayError> {
  let reply = gateway.handle_predict(payload).await?;
  let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
  Ok(HttpResponse::build(status).json(reply.body))
}

async fn health<U: Upstream + 'static>(gateway: web::Data<Gateway<U>>) -> HttpResponse {
  match gateway.upstream().health().await {
    Ok(upstream) => HttpResponse::Ok().json(json!({ "ok": true, "upstream": upstream })),
    Err(err) => {
      warn!("上游健康检查失败: {}", err);
      HttpResponse::BadGateway().json(json!({ "ok": false, "error": err.to_string() }))
    }
  }
}

/// 注册 `/api/predict` 与 `/api/health`
pub fn configure<U: Upstream + 'static>(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api")
      .route("/predict", web::post().to(predict::<U>))
      .route("/health", web::get().to(health::<U>)),
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::body::to_bytes;

  async fn body_of(err: GatewayError) -> (StatusCode, Value) {
    let response = err.error_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  #[actix_web::test]
  async fn missing_file_envelope() {
    let (status, body) = body_of(GatewayError::MissingFile).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": MISSING_FILE_MESSAGE }));
  }

  #[actix_web::test]
  async fn rejected_keeps_upstream_status_and_body() {
    let err = GatewayError::from(UpstreamError::Rejected {
      status: 422,
      body: json!({ "success": false, "error": "Invalid image file" }),
    });
    let (status, body) = body_of(err).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
      body,
      json!({
        "success": false,
        "error": { "success": false, "error": "Invalid image file" },
        "message": PREDICTION_FAILED
      })
    );
  }

  #[actix_web::test]
  async fn rejected_without_body_uses_message() {
    let err = GatewayError::from(UpstreamError::Rejected {
      status: 500,
      body: Value::Null,
    });
    let (status, body) = body_of(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Request failed with status code 500");
  }

  #[actix_web::test]
  async fn unreachable_is_bad_gateway() {
    let err = GatewayError::from(UpstreamError::Unreachable("connection refused".into()));
    let (status, body) = body_of(err).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "connection refused");
    assert_eq!(body["message"], PREDICTION_FAILED);
  }

  #[actix_web::test]
  async fn oversized_upload_is_413() {
    let (status, body) = body_of(GatewayError::FileTooLarge { limit: 10 }).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);
  }
}
