// 该文件是 Tuice （推测） 项目的一部分。
// src/model/yolo26.rs - RKNPU 上的 YOLO26 检测模型
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  frame::LetterboxFrame,
  model::{DetectItem, DetectResult, Model, ModelOptions, sort_by_score},
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_INPUT_SIZE: u32 = 640;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(#[from] rknpu::Error),
}

impl Yolo26Error {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    Yolo26Error::ModelInvalid(msg.to_string(), e)
  }
}

pub struct Yolo26Builder {
  model_path: PathBuf,
  flags: InitFlags,
  options: ModelOptions,
}

impl Yolo26Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      flags: InitFlags::default(),
      options: ModelOptions::default(),
    }
  }

  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn options(mut self, options: ModelOptions) -> Self {
    self.options = options;
    self
  }

  pub fn build(self) -> Result<Yolo26, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path.display());
    let mode_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, self.flags)?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
    }

    if self.options.imgsz != YOLO26_INPUT_SIZE {
      debug!(
        "RKNN 模型输入尺寸固定为 {}, 忽略 imgsz={}",
        YOLO26_INPUT_SIZE, self.options.imgsz
      );
    }
    info!("模型加载完成");

    Ok(Yolo26 { context })
  }
}

/// YOLO26 端到端检测头，无需 NMS
pub struct Yolo26 {
  context: Context,
}

/// 根据张量大小匹配回归和分类输出
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    Some((tensor2, tensor1))
  } else {
    None
  }
}

/// 解码一个检测头，坐标为模型输入像素
fn decode_head(
  reg: &[f32],
  cls: &[f32],
  (map_h, map_w): (usize, usize),
  stride: f32,
  num_classes: usize,
  confidence: f32,
  frame: &LetterboxFrame,
  items: &mut Vec<DetectItem>,
) {
  let spatial = map_h * map_w;
  let input = YOLO26_INPUT_SIZE as f32;

  for h in 0..map_h {
    for w in 0..map_w {
      let idx = h * map_w + w;

      let (score, class_id) = {
        let mut max_logit = f32::MIN;
        let mut cls_idx = 0usize;
        for c in 0..num_classes {
          let logit = cls[c * spatial + idx];
          if logit > max_logit {
            max_logit = logit;
            cls_idx = c;
          }
        }
        (sigmoid(max_logit), cls_idx as u32)
      };

      if score < confidence {
        continue;
      }

      let grid_x = (w as f32) + 0.5;
      let grid_y = (h as f32) + 0.5;

      let xmin = ((grid_x - reg[idx]) * stride).clamp(0.0, input);
      let ymin = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, input);
      let xmax = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, input);
      let ymax = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, input);

      items.push(DetectItem {
        class_id,
        score,
        bbox: frame.restore_box([xmin, ymin, xmax, ymax]),
      });
    }
  }
}

impl Yolo26 {
  fn postprocess(
    output: rknpu::Output,
    confidence: f32,
    frame: &LetterboxFrame,
  ) -> Result<Vec<DetectItem>, Yolo26Error> {
    let mut items = Vec::new();

    for (head_idx, (&map_size, stride)) in
      YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
    {
      let spatial = map_size.0 * map_size.1;
      let reg_expected = 4 * spatial;

      // RKNN 输出顺序不固定，按张量大小区分回归与分类
      let tensor1 = output.get_f32(head_idx * 2)?;
      let tensor2 = output.get_f32(head_idx * 2 + 1)?;
      let cls_len = if tensor1.len() == reg_expected {
        tensor2.len()
      } else {
        tensor1.len()
      };
      let num_classes = cls_len / spatial;

      let Some((reg, cls)) =
        match_reg_cls_tensors(tensor1, tensor2, reg_expected, num_classes * spatial)
      else {
        error!(
          "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}",
          head_idx,
          tensor1.len(),
          tensor2.len()
        );
        return Err(Yolo26Error::invalid(
          "检测头输出大小不匹配",
          rknpu::Error::InvalidModel,
        ));
      };

      decode_head(
        reg,
        cls,
        map_size,
        stride,
        num_classes,
        confidence,
        frame,
        &mut items,
      );
    }

    Ok(items)
  }
}

impl Model for Yolo26 {
  type Error = Yolo26Error;

  const WEIGHTS_FILE: &'static str = "weights/best.rknn";

  fn load(weights: &Path, options: &ModelOptions) -> Result<Self, Self::Error> {
    Yolo26Builder::new(weights).options(options.clone()).build()
  }

  fn infer(&mut self, image: &RgbImage, confidence: f32) -> Result<DetectResult, Self::Error> {
    let frame = LetterboxFrame::from_image(image, YOLO26_INPUT_SIZE);

    debug!("设置模型输入");
    self.context.set_input(
      0,
      frame.as_nhwc(),
      rknpu::TensorFormat::NHWC,
      TensorType::UInt8,
    )?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    let mut items = Self::postprocess(output, confidence, &frame)?;
    sort_by_score(&mut items);
    debug!("检测到 {} 个物体", items.len());

    Ok(DetectResult::from(items))
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
