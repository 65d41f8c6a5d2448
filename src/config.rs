// 该文件是 Kanjian （看见） 项目的一部分。
// src/config.rs - 网关参数配置
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

use std::time::Duration;

use clap::Parser;
use url::Url;

/// Kanjian 推理网关参数配置
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct GatewayConfig {
  /// 监听地址
  #[arg(long, env = "HOST", default_value = "0.0.0.0", value_name = "HOST")]
  pub host: String,

  /// 监听端口
  #[arg(long, env = "PORT", default_value_t = 3001, value_name = "PORT")]
  pub port: u16,

  /// 上游推理服务地址，需提供 /predict 与 /health
  #[arg(
    long,
    env = "YOLO_API_URL",
    default_value = "http://localhost:5000",
    value_name = "URL"
  )]
  pub upstream: Url,

  /// 上传文件大小上限（字节）
  #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = crate::gateway::DEFAULT_MAX_UPLOAD_BYTES, value_name = "BYTES")]
  pub max_upload_bytes: usize,

  /// 推理请求超时（秒）
  #[arg(long, env = "PREDICT_TIMEOUT_SECS", default_value_t = 120, value_name = "SECONDS")]
  pub predict_timeout_secs: u64,

  /// 健康检查超时（秒）
  #[arg(long, env = "HEALTH_TIMEOUT_SECS", default_value_t = 10, value_name = "SECONDS")]
  pub health_timeout_secs: u64,
}

impl GatewayConfig {
  pub fn predict_timeout(&self) -> Duration {
    Duration::from_secs(self.predict_timeout_secs)
  }

  pub fn health_timeout(&self) -> Duration {
    Duration::from_secs(self.health_timeout_secs)
  }
}
