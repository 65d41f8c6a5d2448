// 该文件是 Kanjian （看见） 项目的一部分。
// src/detection.rs - 检测记录定义
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

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// 单个检测结果，坐标位于原图像素空间
///
/// 上游服务不保证字段类型正确，因此每个字段都单独宽松解析：
/// 类型不符的字段视为缺失，而不是让整条记录解析失败。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
  #[serde(
    rename = "class",
    default,
    deserialize_with = "lenient_class",
    skip_serializing_if = "Option::is_none"
  )]
  pub class_id: Option<u32>,
  #[serde(
    default,
    deserialize_with = "lenient",
    skip_serializing_if = "Option::is_none"
  )]
  pub confidence: Option<f32>,
  #[serde(
    default,
    deserialize_with = "lenient",
    skip_serializing_if = "Option::is_none"
  )]
  pub bbox: Option<Vec<f32>>, // [x1, y1, x2, y2]
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned,
{
  let value = Value::deserialize(deserializer)?;
  Ok(serde_json::from_value(value).ok())
}

// 类别编号也接受整数值的浮点数，例如 `2.0`
fn lenient_class<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  let class = match value.as_u64() {
    Some(id) => u32::try_from(id).ok(),
    None => value
      .as_f64()
      .filter(|v| v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(v))
      .map(|v| v as u32),
  };
  Ok(class)
}

impl DetectionRecord {
  pub fn new(class_id: u32, confidence: f32, bbox: [f32; 4]) -> Self {
    Self {
      class_id: Some(class_id),
      confidence: Some(confidence),
      bbox: Some(bbox.to_vec()),
    }
  }

  /// 从任意 JSON 值解析；非对象元素得到空记录，保持其在列表中的位置
  pub fn from_value(value: Value) -> Self {
    serde_json::from_value(value).unwrap_or_default()
  }

  /// 恰好 4 个有限数值时返回边界框，否则视为退化框
  pub fn corners(&self) -> Option<[f32; 4]> {
    let bbox: [f32; 4] = self.bbox.as_deref()?.try_into().ok()?;
    bbox.iter().all(|v| v.is_finite()).then_some(bbox)
  }

  /// 置信度百分比，四舍五入到整数
  pub fn confidence_percent(&self) -> Option<f32> {
    self
      .confidence
      .filter(|c| c.is_finite())
      .map(|c| (c * 100.0).round())
  }

  /// 叠加层标签文本，例如 `cls 2 87%`
  pub fn label(&self) -> String {
    let class = match self.class_id {
      Some(id) => id.to_string(),
      None => "-".to_string(),
    };
    match self.confidence_percent() {
      Some(pct) => format!("cls {} {:.0}%", class, pct),
      None => format!("cls {}", class),
    }
  }
}

/// 解析检测列表；缺失或非数组时得到空列表
pub fn parse_detections(value: Option<&Value>) -> Vec<DetectionRecord> {
  match value {
    Some(Value::Array(items)) => items
      .iter()
      .cloned()
      .map(DetectionRecord::from_value)
      .collect(),
    _ => Vec::new(),
  }
}

/// 检测结果摘要：数量与置信度最高的一项
#[derive(Debug, Clone, PartialEq)]
pub struct Summary<'a> {
  pub count: usize,
  pub top: &'a DetectionRecord,
}

pub fn summarize(detections: &[DetectionRecord]) -> Option<Summary<'_>> {
  let top = detections.iter().max_by(|a, b| {
    let a = a.confidence.unwrap_or(0.0);
    let b = b.confidence.unwrap_or(0.0);
    a.total_cmp(&b)
  })?;
  Some(Summary {
    count: detections.len(),
    top,
  })
}
