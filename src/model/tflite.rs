// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/model/tflite.rs - TFLite 推理后端
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

use std::path::Path;

use tracing::{debug, error, info};
use tract_tflite::prelude::*;

use crate::{
  frame::NhwcTensor,
  model::{Backend, ClassifierError, ElementType, TensorSpec},
};

const TFLITE_NUM_INPUTS: usize = 1;
const TFLITE_NUM_OUTPUTS: usize = 1;

/// 基于 tract 的 TFLite 后端
///
/// 运行计划只读共享，每次 `run` 都会创建独立的执行状态。
pub struct TfliteBackend {
  plan: TypedRunnableModel<TypedModel>,
  input: TensorSpec,
  input_datum: DatumType,
  output: TensorSpec,
}

fn element_type(datum: DatumType) -> Option<ElementType> {
  match datum.unquantized() {
    DatumType::F32 => Some(ElementType::F32),
    DatumType::U8 => Some(ElementType::U8),
    DatumType::I8 => Some(ElementType::I8),
    _ => None,
  }
}

fn tensor_spec(fact: &TypedFact, name: &str) -> Result<TensorSpec, ClassifierError> {
  let shape = fact.shape.as_concrete().ok_or_else(|| {
    ClassifierError::model_load(format!("模型{}形状不是固定值: {:?}", name, fact.shape))
  })?;
  let element_type = element_type(fact.datum_type).ok_or_else(|| {
    ClassifierError::model_load(format!(
      "模型{}元素类型不受支持: {:?}",
      name, fact.datum_type
    ))
  })?;
  Ok(TensorSpec::new(shape, element_type))
}

impl TfliteBackend {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
    let path = path.as_ref();
    let model_data = std::fs::read(path).map_err(|e| {
      ClassifierError::model_load(format!("无法读取模型文件 {}: {}", path.display(), e))
    })?;
    Self::from_bytes(&model_data)
  }

  pub fn from_bytes(model_data: &[u8]) -> Result<Self, ClassifierError> {
    info!("解析 TFLite 模型");
    let model = tract_tflite::tflite()
      .model_for_read(&mut std::io::Cursor::new(model_data))
      .map_err(|e| {
        error!("模型解析失败: {}", e);
        ClassifierError::model_load(format!("无法解析模型: {}", e))
      })?;

    if model.inputs.len() != TFLITE_NUM_INPUTS || model.outputs.len() != TFLITE_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        TFLITE_NUM_INPUTS,
        TFLITE_NUM_OUTPUTS,
        model.inputs.len(),
        model.outputs.len()
      );
      return Err(ClassifierError::model_load(format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        TFLITE_NUM_INPUTS,
        TFLITE_NUM_OUTPUTS,
        model.inputs.len(),
        model.outputs.len()
      )));
    }

    let input_fact = model
      .input_fact(0)
      .map_err(|e| ClassifierError::model_load(format!("无法获取输入张量: {}", e)))?;
    let input_datum = input_fact.datum_type;
    let input = tensor_spec(input_fact, "输入")?;

    let output_fact = model
      .output_fact(0)
      .map_err(|e| ClassifierError::model_load(format!("无法获取输出张量: {}", e)))?;
    let output = tensor_spec(output_fact, "输出")?;

    debug!("模型输入: {:?} {:?}", input.shape, input_datum);
    debug!("模型输出: {:?} {:?}", output.shape, output_fact.datum_type);

    let plan = model
      .into_optimized()
      .and_then(|model| model.into_runnable())
      .map_err(|e| ClassifierError::model_load(format!("无法创建推理计划: {}", e)))?;

    Ok(Self {
      plan,
      input,
      input_datum,
      output,
    })
  }

  fn input_tensor(&self, input: &NhwcTensor) -> TractResult<Tensor> {
    let shape = input.shape();
    let mut tensor = match self.input.element_type {
      ElementType::F32 => Tensor::from_shape(&shape, input.as_nhwc())?,
      ElementType::U8 => Tensor::from_shape(&shape, &input.to_u8())?,
      ElementType::I8 => Tensor::from_shape(&shape, &input.to_i8())?,
    };
    if self.input_datum.is_quantized() {
      // SAFETY: 张量按 input_datum.unquantized() 的存储类型构造，只替换量化参数，不改变元素布局
      unsafe { tensor.set_datum_type(self.input_datum) };
    }
    Ok(tensor)
  }
}

fn output_values(output: &Tensor) -> Result<Vec<f32>, ClassifierError> {
  // 量化输出直接读取原始整数分值
  let values = match output.datum_type().unquantized() {
    DatumType::F32 => output
      .as_slice::<f32>()
      .map_err(|e| ClassifierError::inference(format!("无法读取输出: {}", e)))?
      .to_vec(),
    DatumType::U8 => output
      .as_slice::<u8>()
      .map_err(|e| ClassifierError::inference(format!("无法读取输出: {}", e)))?
      .iter()
      .map(|&v| v as f32)
      .collect(),
    DatumType::I8 => output
      .as_slice::<i8>()
      .map_err(|e| ClassifierError::inference(format!("无法读取输出: {}", e)))?
      .iter()
      .map(|&v| v as f32)
      .collect(),
    other => {
      return Err(ClassifierError::inference(format!(
        "输出元素类型不受支持: {:?}",
        other
      )));
    }
  };
  Ok(values)
}

impl Backend for TfliteBackend {
  fn input_spec(&self) -> &TensorSpec {
    &self.input
  }

  fn output_spec(&self) -> &TensorSpec {
    &self.output
  }

  fn run(&self, input: &NhwcTensor) -> Result<Vec<f32>, ClassifierError> {
    debug!("设置模型输入");
    let tensor = self
      .input_tensor(input)
      .map_err(|e| ClassifierError::inference(format!("无法构造输入张量: {}", e)))?;

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(|e| ClassifierError::inference(format!("模型推理失败: {}", e)))?;

    debug!("获取模型输出");
    let output = outputs
      .first()
      .ok_or_else(|| ClassifierError::inference("模型没有输出"))?;
    output_values(output)
  }
}
