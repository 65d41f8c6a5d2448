// 该文件是 Kanjian （看见） 项目的一部分。
// src/main.rs - 推理网关主程序
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kanjian::config::GatewayConfig;

#[actix_web::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let config = GatewayConfig::parse();

  info!("Kanjian 推理网关");
  info!("上游推理服务: {}", config.upstream);
  info!("上传大小上限: {} 字节", config.max_upload_bytes);
  info!(
    "推理超时: {:?}, 健康检查超时: {:?}",
    config.predict_timeout(),
    config.health_timeout()
  );

  kanjian::gateway::serve(config).await
}
