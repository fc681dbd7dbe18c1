// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/model/classifier.rs - 图像分类器
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
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{NhwcTensor, Orientation, RawImage},
  model::{Backend, ClassifierError, Labels, Model, PredictionMap, TensorSpec, TfliteBackend},
  processor::{ImageOp, ImageProcessor, NormalizeOp},
  url_path, url_query,
};

const IMAGE_MEAN: f32 = 0.0;
const IMAGE_STD: f32 = 1.0;
const PROBABILITY_MEAN: f32 = 0.0;
const PROBABILITY_STD: f32 = 255.0;

const DEFAULT_LABELS_FILE: &str = "labels.txt";

/// 预处理与后处理的归一化参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierOptions {
  pub image_normalize: NormalizeOp,
  pub probability_normalize: NormalizeOp,
}

impl Default for ClassifierOptions {
  fn default() -> Self {
    Self {
      image_normalize: NormalizeOp::from_parts(IMAGE_MEAN, IMAGE_STD),
      probability_normalize: NormalizeOp::from_parts(PROBABILITY_MEAN, PROBABILITY_STD),
    }
  }
}

/// 单输入单输出的图像分类器
///
/// 每次分类都会新建输入缓冲区，不在调用之间共享可变状态；
/// 只要后端是 `Sync` 的，同一个分类器就可以在多个线程中并发使用。
pub struct Classifier<B = TfliteBackend> {
  backend: B,
  labels: Labels,
  input_width: u32,
  input_height: u32,
  options: ClassifierOptions,
}

impl Classifier<TfliteBackend> {
  pub fn load(model_bytes: &[u8], label_text: &str) -> Result<Self, ClassifierError> {
    Self::load_with_options(model_bytes, label_text, ClassifierOptions::default())
  }

  pub fn load_with_options(
    model_bytes: &[u8],
    label_text: &str,
    options: ClassifierOptions,
  ) -> Result<Self, ClassifierError> {
    let backend = TfliteBackend::from_bytes(model_bytes)?;
    let labels = Labels::from_text(label_text)?;
    Classifier::new(backend, labels, options)
  }
}

fn input_size(spec: &TensorSpec) -> Result<(u32, u32), ClassifierError> {
  let (height, width) = match spec.shape.as_slice() {
    &[1, height, width, 3] if height > 0 && width > 0 => (height, width),
    shape => {
      error!("预期模型输入形状为 [1, H, W, 3], 实际为 {:?}", shape);
      return Err(ClassifierError::model_load(format!(
        "预期模型输入形状为 [1, H, W, 3], 实际为 {:?}",
        shape
      )));
    }
  };

  let width = u32::try_from(width)
    .map_err(|_| ClassifierError::model_load(format!("模型输入宽度过大: {}", width)))?;
  let height = u32::try_from(height)
    .map_err(|_| ClassifierError::model_load(format!("模型输入高度过大: {}", height)))?;
  Ok((width, height))
}

fn output_size(spec: &TensorSpec) -> Result<usize, ClassifierError> {
  match spec.shape.as_slice() {
    &[1, n] | &[n] if n > 0 => Ok(n),
    shape => {
      error!("预期模型输出形状为 [1, N], 实际为 {:?}", shape);
      Err(ClassifierError::model_load(format!(
        "预期模型输出形状为 [1, N], 实际为 {:?}",
        shape
      )))
    }
  }
}

impl<B: Backend> Classifier<B> {
  pub fn new(
    backend: B,
    labels: Labels,
    options: ClassifierOptions,
  ) -> Result<Self, ClassifierError> {
    let (input_width, input_height) = input_size(backend.input_spec())?;
    let outputs = output_size(backend.output_spec())?;

    if labels.len() != outputs {
      error!("标签数量 {} 与模型输出数量 {} 不一致", labels.len(), outputs);
      return Err(ClassifierError::LabelMismatch {
        labels: labels.len(),
        outputs,
      });
    }

    debug!(
      "模型输入: {}x{} {}, 模型输出: {} 个 {}",
      input_width,
      input_height,
      backend.input_spec().element_type,
      outputs,
      backend.output_spec().element_type
    );

    Ok(Self {
      backend,
      labels,
      input_width,
      input_height,
      options,
    })
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  /// 模型输入尺寸 (宽, 高)
  pub fn input_size(&self) -> (u32, u32) {
    (self.input_width, self.input_height)
  }

  pub fn options(&self) -> &ClassifierOptions {
    &self.options
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn classify(
    &self,
    image: &RgbImage,
    orientation_degrees: i32,
  ) -> Result<PredictionMap, ClassifierError> {
    let orientation = Orientation::from_degrees(orientation_degrees)?;
    self.classify_oriented(image, orientation)
  }

  pub fn classify_oriented(
    &self,
    image: &RgbImage,
    orientation: Orientation,
  ) -> Result<PredictionMap, ClassifierError> {
    let tensor = self.preprocess(image, orientation)?;

    let now = std::time::Instant::now();
    let raw = self.backend.run(&tensor)?;
    debug!("模型推理完成，耗时: {:.2?}", now.elapsed());

    self.postprocess(&raw)
  }

  /// 居中裁剪为正方形、最近邻缩放到模型尺寸、按方向逆时针旋转
  ///
  /// 奇数次旋转且模型输入不是正方形时，缩放目标宽高对调，保证旋转后与模型形状一致。
  pub fn image_processor(
    &self,
    width: u32,
    height: u32,
    orientation: Orientation,
  ) -> ImageProcessor {
    let crop = width.min(height);
    let quarter_turns = orientation.quarter_turns();
    let (resize_width, resize_height) = if quarter_turns % 2 == 1 {
      (self.input_height, self.input_width)
    } else {
      (self.input_width, self.input_height)
    };

    ImageProcessor::default()
      .add(ImageOp::ResizeWithCropOrPad {
        width: crop,
        height: crop,
      })
      .add(ImageOp::Resize {
        width: resize_width,
        height: resize_height,
      })
      .add(ImageOp::Rot90 { quarter_turns })
      .normalize(self.options.image_normalize)
  }

  pub fn preprocess(
    &self,
    image: &RgbImage,
    orientation: Orientation,
  ) -> Result<NhwcTensor, ClassifierError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return Err(ClassifierError::InvalidImage(format!(
        "图像尺寸为 {}x{}",
        width, height
      )));
    }

    debug!("预处理图像: {}x{}, 方向 {}", width, height, orientation);
    Ok(self.image_processor(width, height, orientation).process(image))
  }

  /// 输出按 `(v - mean) / std` 缩放后与标签一一对应
  pub fn postprocess(&self, raw: &[f32]) -> Result<PredictionMap, ClassifierError> {
    if raw.len() != self.labels.len() {
      return Err(ClassifierError::inference(format!(
        "输出长度 {} 与标签数量 {} 不一致",
        raw.len(),
        self.labels.len()
      )));
    }

    let normalize = &self.options.probability_normalize;
    let entries = self
      .labels
      .iter()
      .zip(raw)
      .map(|(label, &value)| (label.to_string(), normalize.apply(value)))
      .collect();
    Ok(PredictionMap::from_entries(entries))
  }
}

impl<B: Backend> Model for Classifier<B> {
  type Input = RawImage;
  type Output = PredictionMap;
  type Error = ClassifierError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.classify_oriented(&input.image, input.orientation)
  }
}

pub struct ClassifierBuilder {
  model_path: PathBuf,
  labels_path: PathBuf,
  options: ClassifierOptions,
}

fn query_f32(url: &Url, key: &str, default: f32) -> Result<f32, ClassifierError> {
  match url_query(url, key) {
    Some(value) => value.parse::<f32>().map_err(|_| {
      ClassifierError::InvalidConfig(format!("参数 {} 不是有效的数值: {}", key, value))
    }),
    None => Ok(default),
  }
}

impl FromUrlWithScheme for ClassifierBuilder {
  const SCHEME: &'static str = "tflite";
}

impl FromUrl for ClassifierBuilder {
  type Error = ClassifierError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ClassifierError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let model_path = PathBuf::from(url_path(url));
    let builder = match url_query(url, "labels") {
      Some(labels) => ClassifierBuilder::new(&model_path).labels(labels),
      None => ClassifierBuilder::new(&model_path),
    };

    let defaults = ClassifierOptions::default();
    let image_normalize = NormalizeOp::new(
      query_f32(url, "image_mean", defaults.image_normalize.mean())?,
      query_f32(url, "image_std", defaults.image_normalize.std())?,
    )?;
    let probability_normalize = NormalizeOp::new(
      query_f32(url, "probability_mean", defaults.probability_normalize.mean())?,
      query_f32(url, "probability_std", defaults.probability_normalize.std())?,
    )?;

    Ok(builder.options(ClassifierOptions {
      image_normalize,
      probability_normalize,
    }))
  }
}

impl ClassifierBuilder {
  /// 标签文件默认为模型同目录下的 labels.txt
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    let model_path = model_path.as_ref().to_path_buf();
    let labels_path = model_path
      .parent()
      .map(|dir| dir.join(DEFAULT_LABELS_FILE))
      .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_FILE));
    Self {
      model_path,
      labels_path,
      options: ClassifierOptions::default(),
    }
  }

  pub fn labels(mut self, labels_path: impl AsRef<Path>) -> Self {
    self.labels_path = labels_path.as_ref().to_path_buf();
    self
  }

  pub fn options(mut self, options: ClassifierOptions) -> Self {
    self.options = options;
    self
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn labels_path(&self) -> &Path {
    &self.labels_path
  }

  pub fn build(self) -> Result<Classifier<TfliteBackend>, ClassifierError> {
    info!("加载模型文件: {}", self.model_path.display());
    let model_data = std::fs::read(&self.model_path).map_err(|e| {
      ClassifierError::model_load(format!("无法读取模型文件 {}: {}", self.model_path.display(), e))
    })?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("加载标签文件: {}", self.labels_path.display());
    let label_text = std::fs::read_to_string(&self.labels_path).map_err(|e| {
      ClassifierError::model_load(format!("无法读取标签文件 {}: {}", self.labels_path.display(), e))
    })?;

    let classifier = Classifier::load_with_options(&model_data, &label_text, self.options)?;
    info!("模型加载完成");
    Ok(classifier)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ElementType;
  use image::Rgb;

  struct FixedBackend {
    input: TensorSpec,
    output: TensorSpec,
    values: Vec<f32>,
  }

  impl FixedBackend {
    fn new(input: &[usize], output: &[usize], values: Vec<f32>) -> Self {
      Self {
        input: TensorSpec::new(input, ElementType::F32),
        output: TensorSpec::new(output, ElementType::U8),
        values,
      }
    }
  }

  impl Backend for FixedBackend {
    fn input_spec(&self) -> &TensorSpec {
      &self.input
    }

    fn output_spec(&self) -> &TensorSpec {
      &self.output
    }

    fn run(&self, input: &NhwcTensor) -> Result<Vec<f32>, ClassifierError> {
      assert_eq!(input.shape().to_vec(), self.input.shape);
      Ok(self.values.clone())
    }
  }

  struct FailingBackend(TensorSpec, TensorSpec);

  impl Backend for FailingBackend {
    fn input_spec(&self) -> &TensorSpec {
      &self.0
    }

    fn output_spec(&self) -> &TensorSpec {
      &self.1
    }

    fn run(&self, _input: &NhwcTensor) -> Result<Vec<f32>, ClassifierError> {
      Err(ClassifierError::inference("输入张量损坏"))
    }
  }

  fn labels(text: &str) -> Labels {
    Labels::from_text(text).unwrap()
  }

  #[test]
  fn output_is_rescaled_by_255() {
    let backend = FixedBackend::new(&[1, 4, 4, 3], &[1, 3], vec![255.0, 51.0, 0.0]);
    let classifier =
      Classifier::new(backend, labels("a\nb\nc"), ClassifierOptions::default()).unwrap();
    let image = RgbImage::from_pixel(8, 6, Rgb([1, 2, 3]));

    let predictions = classifier.classify(&image, 0).unwrap();
    assert_eq!(predictions.get("a"), Some(1.0));
    assert_eq!(predictions.get("b"), Some(0.2));
    assert_eq!(predictions.get("c"), Some(0.0));
    assert_eq!(predictions.top(), Some(("a", 1.0)));
  }

  #[test]
  fn label_count_must_match_output() {
    let backend = FixedBackend::new(&[1, 4, 4, 3], &[1, 3], vec![0.0; 3]);
    let result = Classifier::new(backend, labels("a\nb"), ClassifierOptions::default());
    assert!(matches!(
      result,
      Err(ClassifierError::LabelMismatch {
        labels: 2,
        outputs: 3
      })
    ));
  }

  #[test]
  fn rejects_unsupported_shapes() {
    let nchw = FixedBackend::new(&[1, 3, 4, 4], &[1, 2], vec![0.0; 2]);
    assert!(matches!(
      Classifier::new(nchw, labels("a\nb"), ClassifierOptions::default()),
      Err(ClassifierError::ModelLoad(_))
    ));

    let grid = FixedBackend::new(&[1, 4, 4, 3], &[1, 2, 2], vec![0.0; 4]);
    assert!(matches!(
      Classifier::new(grid, labels("a\nb\nc\nd"), ClassifierOptions::default()),
      Err(ClassifierError::ModelLoad(_))
    ));
  }

  #[test]
  fn flat_output_shape_is_accepted() {
    let backend = FixedBackend::new(&[1, 2, 2, 3], &[2], vec![0.0, 255.0]);
    let classifier =
      Classifier::new(backend, labels("a\nb"), ClassifierOptions::default()).unwrap();
    assert_eq!(classifier.input_size(), (2, 2));
  }

  #[test]
  fn rejects_non_quarter_orientation() {
    let backend = FixedBackend::new(&[1, 4, 4, 3], &[1, 1], vec![0.0]);
    let classifier = Classifier::new(backend, labels("a"), ClassifierOptions::default()).unwrap();
    let image = RgbImage::new(4, 4);
    assert!(matches!(
      classifier.classify(&image, 45),
      Err(ClassifierError::InvalidOrientation(_))
    ));
  }

  #[test]
  fn rejects_empty_image() {
    let backend = FixedBackend::new(&[1, 4, 4, 3], &[1, 1], vec![0.0]);
    let classifier = Classifier::new(backend, labels("a"), ClassifierOptions::default()).unwrap();
    assert!(matches!(
      classifier.classify(&RgbImage::new(0, 0), 0),
      Err(ClassifierError::InvalidImage(_))
    ));
  }

  #[test]
  fn runtime_output_length_mismatch_is_inference_error() {
    let backend = FixedBackend::new(&[1, 4, 4, 3], &[1, 2], vec![1.0, 2.0, 3.0]);
    let classifier =
      Classifier::new(backend, labels("a\nb"), ClassifierOptions::default()).unwrap();
    assert!(matches!(
      classifier.classify(&RgbImage::new(4, 4), 0),
      Err(ClassifierError::Inference(_))
    ));
  }

  #[test]
  fn backend_failure_propagates() {
    let backend = FailingBackend(
      TensorSpec::new([1, 4, 4, 3], ElementType::F32),
      TensorSpec::new([1, 1], ElementType::F32),
    );
    let classifier = Classifier::new(backend, labels("a"), ClassifierOptions::default()).unwrap();
    assert!(matches!(
      classifier.classify(&RgbImage::new(4, 4), 90),
      Err(ClassifierError::Inference(_))
    ));
  }

  #[test]
  fn odd_rotation_on_non_square_input_keeps_model_shape() {
    // FixedBackend::run 断言输入形状等于模型声明的形状
    let backend = FixedBackend::new(&[1, 2, 6, 3], &[1, 1], vec![0.0]);
    let classifier = Classifier::new(backend, labels("a"), ClassifierOptions::default()).unwrap();
    let image = RgbImage::new(10, 7);
    for degrees in [0, 90, 180, 270] {
      let tensor = classifier
        .preprocess(&image, Orientation::from_degrees(degrees).unwrap())
        .unwrap();
      assert_eq!(tensor.shape(), [1, 2, 6, 3]);
      classifier.classify(&image, degrees).unwrap();
    }
  }

  #[test]
  fn builder_from_url_reads_options() {
    let url = Url::parse(
      "tflite:///opt/models/sneakers.tflite?labels=/opt/models/names.txt&probability_std=100",
    )
    .unwrap();
    let builder = ClassifierBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), Path::new("/opt/models/sneakers.tflite"));
    assert_eq!(builder.labels_path(), Path::new("/opt/models/names.txt"));
    assert_eq!(builder.options.probability_normalize.std(), 100.0);
    assert_eq!(builder.options.image_normalize, NormalizeOp::default());
  }

  #[test]
  fn builder_defaults_labels_next_to_model() {
    let url = Url::parse("tflite:///opt/models/sneakers.tflite").unwrap();
    let builder = ClassifierBuilder::from_url(&url).unwrap();
    assert_eq!(builder.labels_path(), Path::new("/opt/models/labels.txt"));
  }

  #[test]
  fn builder_rejects_bad_urls() {
    let wrong_scheme = Url::parse("rknn:///opt/models/sneakers.rknn").unwrap();
    assert!(matches!(
      ClassifierBuilder::from_url(&wrong_scheme),
      Err(ClassifierError::SchemeMismatch(_))
    ));

    let zero_std = Url::parse("tflite:///m.tflite?image_std=0").unwrap();
    assert!(matches!(
      ClassifierBuilder::from_url(&zero_std),
      Err(ClassifierError::InvalidConfig(_))
    ));

    let not_a_number = Url::parse("tflite:///m.tflite?probability_mean=abc").unwrap();
    assert!(matches!(
      ClassifierBuilder::from_url(&not_a_number),
      Err(ClassifierError::InvalidConfig(_))
    ));
  }

  #[test]
  fn build_with_missing_model_is_load_error() {
    let result = ClassifierBuilder::new("/definitely/not/here/model.tflite").build();
    assert!(matches!(result, Err(ClassifierError::ModelLoad(_))));
  }
}
