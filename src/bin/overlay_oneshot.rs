// 该文件是 Kanjian （看见） 项目的一部分。
// src/bin/overlay_oneshot.rs - 单张图像检测并保存叠加结果
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

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use kanjian::{
  FromUrl,
  client::{GatewayClient, PredictionSlot},
  detection::summarize,
  input::ImageFileInput,
  output::{Render, SaveOverlayImageOutput, draw::OverlayRasterizer},
  overlay::{OverlayView, Size},
};

/// 上传一张图像到网关，并把检测框叠加到按显示尺寸缩放的图像上
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 网关地址
  #[arg(long, default_value = "http://localhost:3001", value_name = "URL")]
  pub gateway: Url,
  /// 输入图像，例如 image:///tmp/cat.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///tmp/cat-boxes.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 显示宽度，缺省为原图宽度
  #[arg(long, value_name = "PIXELS")]
  pub display_width: Option<u32>,
  /// 显示高度，缺省为原图高度
  #[arg(long, value_name = "PIXELS")]
  pub display_height: Option<u32>,
  /// 标签字体文件（TTF/OTF），缺省时只绘制标签底板
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("网关地址: {}", args.gateway);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let client = GatewayClient::from_url(&args.gateway)?;
  let rasterizer = match &args.font {
    Some(path) => OverlayRasterizer::from_font_file(path)?,
    None => OverlayRasterizer::new(),
  };
  if !rasterizer.has_font() {
    warn!("未指定字体，只绘制标签底板");
  }

  let native = input.native_size();
  let display_size = Size::new(
    args.display_width.unwrap_or(native.width),
    args.display_height.unwrap_or(native.height),
  );
  info!(
    "原图尺寸: {}x{}, 显示尺寸: {}x{}",
    native.width, native.height, display_size.width, display_size.height
  );
  info!(
    "上传文件: {} ({} 字节, {})",
    input.upload().filename,
    input.upload().len(),
    input.upload().content_type
  );

  let (upload, image) = input.into_parts();

  let mut slot = PredictionSlot::default();
  let ticket = slot.begin();

  info!("开始推理...");
  let now = std::time::Instant::now();
  let detections = client.predict(upload).await?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  match summarize(&detections) {
    Some(summary) => info!(
      "检测到 {} 个对象，最高置信度: {}",
      summary.count,
      summary.top.label()
    ),
    None => info!("未检测到对象"),
  }

  slot.apply(ticket, detections);
  let detections = slot.current().cloned().unwrap_or_else(|| Arc::from(Vec::new()));

  let frame = {
    let mut view = OverlayView::new(&rasterizer);
    view.load_image(native);
    view.resize(display_size);
    view.set_detections(detections).clone()
  };

  let output = SaveOverlayImageOutput::from_url(&args.output)?.with_rasterizer(rasterizer);
  output.render_result(&image, &frame)?;

  Ok(())
}
