// 该文件是 Kanjian （看见） 项目的一部分。
// tests/common/mod.rs - 集成测试公共工具
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

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::{
  Arc, Mutex,
  atomic::{AtomicUsize, Ordering},
};

use actix_multipart::Multipart;
use actix_web::{
  App, HttpResponse, HttpServer,
  http::{StatusCode, header},
  test::TestRequest,
  web,
};
use serde_json::{Value, json};
use url::Url;

pub use kanjian::gateway::{
  Gateway, MISSING_FILE_MESSAGE, PREDICTION_FAILED, Upstream, UpstreamError, UpstreamReply,
  configure, read_upload,
};
pub use kanjian::upload::ImageUpload;

pub const BOUNDARY: &str = "kanjian-test-boundary";

pub enum Field<'a> {
  Text(&'a str, &'a str),
  File {
    name: &'a str,
    filename: &'a str,
    content_type: &'a str,
    data: &'a [u8],
  },
}

pub fn multipart_body(fields: &[Field]) -> Vec<u8> {
  let mut body = Vec::new();
  for field in fields {
    match field {
      Field::Text(name, value) => {
        body.extend_from_slice(
          format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
            .as_bytes(),
        );
      }
      Field::File {
        name,
        filename,
        content_type,
        data,
      } => {
        body.extend_from_slice(
          format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
          )
          .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
      }
    }
  }
  body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
  body
}

/// 构造只含一个文件字段的 multipart 正文
pub fn file_part(name: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
  multipart_body(&[Field::File {
    name,
    filename,
    content_type,
    data,
  }])
}

/// 构造只含一个文本字段的 multipart 正文
pub fn text_part(name: &str, value: &str) -> Vec<u8> {
  multipart_body(&[Field::Text(name, value)])
}

pub fn predict_request(body: Vec<u8>) -> TestRequest {
  TestRequest::post()
    .uri("/api/predict")
    .insert_header((
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={BOUNDARY}"),
    ))
    .set_payload(body)
}

/// 以 JPEG 文件头开头的假图像，网关不会解码它
pub fn jpeg_bytes() -> Vec<u8> {
  let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
  bytes.extend((0..256u32).map(|i| (i % 251) as u8));
  bytes
}

pub fn one_detection_body() -> Value {
  json!({
    "success": true,
    "predictions": [{ "class": 2, "confidence": 0.87, "bbox": [100, 50, 300, 400] }],
    "message": "Prediction completed successfully"
  })
}

/// 进程内的推理服务替身
#[derive(Clone)]
pub struct FakeUpstream {
  pub calls: Arc<AtomicUsize>,
  pub received: Arc<Mutex<Vec<ImageUpload>>>,
  pub reply: Result<UpstreamReply, UpstreamError>,
  pub health: Result<Value, UpstreamError>,
}

impl FakeUpstream {
  pub fn replying(status: u16, body: Value) -> Self {
    Self::with_result(Ok(UpstreamReply { status, body }))
  }

  pub fn with_result(reply: Result<UpstreamReply, UpstreamError>) -> Self {
    Self {
      calls: Arc::new(AtomicUsize::new(0)),
      received: Arc::new(Mutex::new(Vec::new())),
      reply,
      health: Ok(json!({ "status": "healthy", "model_loaded": true })),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Upstream for FakeUpstream {
  async fn predict(&self, upload: ImageUpload) -> Result<UpstreamReply, UpstreamError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.received.lock().unwrap().push(upload);
    self.reply.clone()
  }

  async fn health(&self) -> Result<Value, UpstreamError> {
    self.health.clone()
  }
}

struct StubState {
  status: StatusCode,
  body: Value,
  hits: Arc<AtomicUsize>,
  received: Arc<Mutex<Vec<ImageUpload>>>,
}

async fn stub_predict(state: web::Data<StubState>, payload: Multipart) -> HttpResponse {
  // 解析前计数，任何到达上游的请求都会被记录
  state.hits.fetch_add(1, Ordering::SeqCst);
  match read_upload(payload, usize::MAX).await {
    Ok(upload) => {
      state.received.lock().unwrap().push(upload);
      HttpResponse::build(state.status).json(state.body.clone())
    }
    Err(err) => HttpResponse::BadRequest().json(json!({ "error": err.to_string() })),
  }
}

async fn stub_health() -> HttpResponse {
  HttpResponse::Ok().json(json!({ "status": "healthy", "model_loaded": true }))
}

/// 监听临时端口的推理服务 HTTP 桩
pub struct StubUpstream {
  pub url: Url,
  pub hits: Arc<AtomicUsize>,
  pub received: Arc<Mutex<Vec<ImageUpload>>>,
}

impl StubUpstream {
  /// 到达 `/predict` 的请求数，包括无法解析的请求
  pub fn requests(&self) -> usize {
    self.hits.load(Ordering::SeqCst)
  }
}

pub fn spawn_stub(status: u16, body: Value) -> anyhow::Result<StubUpstream> {
  let hits = Arc::new(AtomicUsize::new(0));
  let received = Arc::new(Mutex::new(Vec::new()));
  let state = web::Data::new(StubState {
    status: StatusCode::from_u16(status)?,
    body,
    hits: hits.clone(),
    received: received.clone(),
  });

  let server = HttpServer::new(move || {
    App::new()
      .app_data(state.clone())
      .route("/predict", web::post().to(stub_predict))
      .route("/health", web::get().to(stub_health))
  })
  .workers(1)
  .bind(("127.0.0.1", 0))?;
  let addr = server.addrs()[0];
  actix_web::rt::spawn(server.run());

  Ok(StubUpstream {
    url: Url::parse(&format!("http://{addr}"))?,
    hits,
    received,
  })
}

/// 在临时端口上启动网关，返回其基础地址
pub fn spawn_gateway<U>(gateway: Gateway<U>) -> anyhow::Result<Url>
where
  U: Upstream + Send + Sync + 'static,
{
  let gateway = web::Data::new(gateway);
  let server = HttpServer::new(move || {
    App::new()
      .app_data(gateway.clone())
      .configure(configure::<U>)
  })
  .workers(1)
  .bind(("127.0.0.1", 0))?;
  let addr = server.addrs()[0];
  actix_web::rt::spawn(server.run());
  Ok(Url::parse(&format!("http://{addr}"))?)
}

/// 没有任何服务监听的本地地址
pub fn closed_port_url() -> anyhow::Result<Url> {
  let listener = TcpListener::bind("127.0.0.1:0")?;
  let addr = listener.local_addr()?;
  drop(listener);
  Ok(Url::parse(&format!("http://{addr}"))?)
}
