// 该文件是 Kanjian （看见） 项目的一部分。
// src/overlay/view.rs - 响应式叠加层视图
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

use tracing::debug;

use crate::detection::DetectionRecord;
use crate::overlay::{EstimatedMetrics, ImageGeometry, OverlayFrame, Size, TextMetrics, render_overlay};

/// 持有三个输入（图像、显示尺寸、检测列表），任一输入变化即重新渲染
pub struct OverlayView<M = EstimatedMetrics> {
  geometry: ImageGeometry,
  detections: Arc<[DetectionRecord]>,
  metrics: M,
  frame: OverlayFrame,
}

impl Default for OverlayView<EstimatedMetrics> {
  fn default() -> Self {
    Self::new(EstimatedMetrics::default())
  }
}

impl<M: TextMetrics> OverlayView<M> {
  pub fn new(metrics: M) -> Self {
    Self {
      geometry: ImageGeometry::default(),
      detections: Arc::from(Vec::new()),
      metrics,
      frame: OverlayFrame::default(),
    }
  }

  pub fn geometry(&self) -> ImageGeometry {
    self.geometry
  }

  pub fn detections(&self) -> &Arc<[DetectionRecord]> {
    &self.detections
  }

  pub fn frame(&self) -> &OverlayFrame {
    &self.frame
  }

  /// 新图像加载完成，原图尺寸可能改变
  pub fn load_image(&mut self, native: Size) -> &OverlayFrame {
    self.geometry.native = native;
    self.refresh()
  }

  /// 图像被移除或尚未加载
  pub fn unload_image(&mut self) -> &OverlayFrame {
    self.geometry.native = Size::ZERO;
    self.refresh()
  }

  /// 布局变化导致显示尺寸改变
  pub fn resize(&mut self, display: Size) -> &OverlayFrame {
    self.geometry.display = display;
    self.refresh()
  }

  pub fn set_detections(&mut self, detections: Arc<[DetectionRecord]>) -> &OverlayFrame {
    self.detections = detections;
    self.refresh()
  }

  fn refresh(&mut self) -> &OverlayFrame {
    self.frame = render_overlay(&self.geometry, &self.detections, &self.metrics);
    debug!(
      "重新计算叠加层: 原图 {}x{} -> 显示 {}x{}, {} 条绘制指令",
      self.geometry.native.width,
      self.geometry.native.height,
      self.geometry.display.width,
      self.geometry.display.height,
      self.frame.commands.len()
    );
    &self.frame
  }
}
