// 该文件是 Kanjian （看见） 项目的一部分。
// src/gateway/server.rs - 网关 HTTP 服务
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

use actix_cors::Cors;
use actix_web::{
  App, HttpServer,
  middleware::{DefaultHeaders, Logger},
  web,
};
use anyhow::{Context, Result};
use tracing::info;

use crate::{
  FromUrl,
  config::GatewayConfig,
  gateway::{Gateway, HttpUpstream, HttpUpstreamBuilder, configure},
};

/// 按配置启动网关，直到服务停止
pub async fn serve(config: GatewayConfig) -> Result<()> {
  let upstream = HttpUpstreamBuilder::from_url(&config.upstream)?
    .predict_timeout(config.predict_timeout())
    .health_timeout(config.health_timeout())
    .build()?;
  let gateway =
    web::Data::new(Gateway::new(upstream).with_max_upload_bytes(config.max_upload_bytes));

  let server = HttpServer::new(move || {
    App::new()
      .app_data(gateway.clone())
      .wrap(
        Cors::default()
          .allow_any_origin()
          .allow_any_method()
          .allow_any_header(),
      )
      .wrap(
        DefaultHeaders::new()
          .add(("X-Content-Type-Options", "nosniff"))
          .add(("X-Frame-Options", "SAMEORIGIN"))
          .add(("Referrer-Policy", "no-referrer")),
      )
      .wrap(Logger::default())
      .configure(configure::<HttpUpstream>)
  })
  .bind((config.host.as_str(), config.port))
  .with_context(|| format!("无法监听 {}:{}", config.host, config.port))?;

  info!("网关监听于 http://{}:{}", config.host, config.port);
  info!("代理上游推理服务: {}", config.upstream);

  server.run().await.context("网关服务异常退出")
}
