// 该文件是 Xieshi （鞋识） 项目的一部分。
// tests/classify_pipeline.rs - 分类流程集成测试
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

use image::{Rgb, RgbImage, imageops};
use xieshi::{
  FromUrl,
  frame::{NhwcTensor, Orientation, RawImage},
  model::{
    Backend, Classifier, ClassifierBuilder, ClassifierError, ClassifierOptions, ElementType,
    Labels, Model, TensorSpec,
  },
  output::{JsonRecordOutput, buy_link::BuyLinkTable},
  task::{ContinuousTask, OneShotTask, Task},
};

const SIDE: usize = 4;

/// 把输入张量每个像素的红色通道原样作为输出，便于观察预处理结果
struct ProbeBackend {
  input: TensorSpec,
  output: TensorSpec,
}

impl ProbeBackend {
  fn new() -> Self {
    Self {
      input: TensorSpec::new([1, SIDE, SIDE, 3], ElementType::F32),
      output: TensorSpec::new([1, SIDE * SIDE], ElementType::F32),
    }
  }
}

impl Backend for ProbeBackend {
  fn input_spec(&self) -> &TensorSpec {
    &self.input
  }

  fn output_spec(&self) -> &TensorSpec {
    &self.output
  }

  fn run(&self, input: &NhwcTensor) -> Result<Vec<f32>, ClassifierError> {
    Ok(input.as_nhwc().chunks(3).map(|pixel| pixel[0]).collect())
  }
}

fn probe_labels() -> Labels {
  let text: Vec<String> = (0..SIDE * SIDE).map(|i| format!("p{}", i)).collect();
  Labels::from_text(&text.join("\n")).unwrap()
}

fn probe_classifier() -> Classifier<ProbeBackend> {
  Classifier::new(ProbeBackend::new(), probe_labels(), ClassifierOptions::default()).unwrap()
}

/// 8x8 图像，由 2x2 的同色块组成，缩放到 4x4 时结果与采样位置无关
fn block_image() -> RgbImage {
  RgbImage::from_fn(8, 8, |x, y| {
    let block = (y / 2) * 4 + x / 2;
    Rgb([(block * 15 + 5) as u8, 0, 0])
  })
}

#[test]
fn result_keys_match_labels_for_every_orientation() {
  let classifier = probe_classifier();
  let image = block_image();
  for degrees in [0, 90, 180, 270] {
    let result = classifier.classify(&image, degrees).unwrap();
    let labels: Vec<&str> = result.labels().collect();
    let expected: Vec<&str> = classifier.labels().iter().collect();
    assert_eq!(labels, expected);
  }
}

#[test]
fn classification_is_deterministic() {
  let classifier = probe_classifier();
  let image = block_image();
  let first = classifier.classify(&image, 90).unwrap();
  let second = classifier.classify(&image, 90).unwrap();
  assert_eq!(first, second);
}

#[test]
fn upright_image_keeps_raster_order() {
  let classifier = probe_classifier();
  let result = classifier.classify(&block_image(), 0).unwrap();
  for (i, (_, probability)) in result.iter().enumerate() {
    let expected = (i * 15 + 5) as f32 / 255.0;
    assert!((probability - expected).abs() < 1e-6);
  }
  assert_eq!(result.top().map(|(label, _)| label), Some("p15"));
}

#[test]
fn orientation_compensates_sensor_rotation() {
  let classifier = probe_classifier();
  let upright = block_image();
  let expected = classifier.classify(&upright, 0).unwrap();

  // 传感器方向为 d 度时，拍到的画面相对正立画面顺时针转了 d 度
  let captured = [
    (90, imageops::rotate90(&upright)),
    (180, imageops::rotate180(&upright)),
    (270, imageops::rotate270(&upright)),
  ];
  for (degrees, image) in captured {
    assert_eq!(classifier.classify(&image, degrees).unwrap(), expected, "{}", degrees);
  }

  let negative = classifier
    .classify(&imageops::rotate270(&upright), -90)
    .unwrap();
  assert_eq!(negative, expected);
}

#[test]
fn non_square_image_is_center_cropped() {
  let classifier = probe_classifier();
  // 12x8 图像，中间 8x8 为黑色，两侧各 2 列为红色
  let image = RgbImage::from_fn(12, 8, |x, _| {
    if (2..10).contains(&x) {
      Rgb([0, 0, 0])
    } else {
      Rgb([255, 0, 0])
    }
  });

  let tensor = classifier.preprocess(&image, Orientation::Deg0).unwrap();
  assert_eq!(tensor.shape(), [1, SIDE, SIDE, 3]);
  assert!(tensor.as_nhwc().iter().all(|&v| v == 0.0));

  let tall = imageops::rotate90(&image);
  let tensor = classifier.preprocess(&tall, Orientation::Deg90).unwrap();
  assert!(tensor.as_nhwc().iter().all(|&v| v == 0.0));
}

#[test]
fn invalid_orientation_is_rejected() {
  let classifier = probe_classifier();
  assert!(matches!(
    classifier.classify(&block_image(), 45),
    Err(ClassifierError::InvalidOrientation(_))
  ));
}

#[test]
fn empty_image_is_rejected() {
  let classifier = probe_classifier();
  assert!(matches!(
    classifier.classify(&RgbImage::new(0, 0), 0),
    Err(ClassifierError::InvalidImage(_))
  ));
}

#[test]
fn label_count_must_match_outputs() {
  let labels = Labels::from_text("Air Jordan 1\nYeezy 350\nDunk Low").unwrap();
  let result = Classifier::new(ProbeBackend::new(), labels, ClassifierOptions::default());
  assert!(matches!(
    result,
    Err(ClassifierError::LabelMismatch {
      labels: 3,
      outputs: 16
    })
  ));
}

#[test]
fn malformed_model_fails_to_load() {
  assert!(matches!(
    Classifier::load(b"garbage", "a\nb"),
    Err(ClassifierError::ModelLoad(_))
  ));
}

#[test]
fn builder_reports_missing_files_as_model_load() {
  let dir = tempfile::tempdir().unwrap();
  let labels = dir.path().join("labels.txt");
  std::fs::write(&labels, "a\nb\n").unwrap();

  let missing = ClassifierBuilder::new(dir.path().join("model.tflite")).build();
  assert!(matches!(missing, Err(ClassifierError::ModelLoad(_))));

  let model = dir.path().join("model.tflite");
  std::fs::write(&model, b"not a flatbuffer").unwrap();
  let url = url::Url::parse(&format!(
    "tflite://{}?labels={}",
    model.display(),
    labels.display()
  ))
  .unwrap();
  let builder = ClassifierBuilder::from_url(&url).unwrap();
  assert_eq!(builder.labels_path(), labels.as_path());
  assert!(matches!(builder.build(), Err(ClassifierError::ModelLoad(_))));
}

#[test]
fn classifier_is_shared_between_threads() {
  let classifier = probe_classifier();
  let image = block_image();
  let expected = classifier.classify(&image, 180).unwrap();

  std::thread::scope(|scope| {
    let handles: Vec<_> = (0..4)
      .map(|_| scope.spawn(|| classifier.classify(&image, 180).unwrap()))
      .collect();
    for handle in handles {
      assert_eq!(handle.join().unwrap(), expected);
    }
  });
}

#[test]
fn model_trait_uses_frame_orientation() {
  let classifier = probe_classifier();
  let upright = block_image();
  let frame = RawImage::new(imageops::rotate180(&upright), Orientation::Deg180);
  assert_eq!(
    classifier.infer(&frame).unwrap(),
    classifier.classify(&upright, 0).unwrap()
  );
}

#[test]
fn one_shot_task_writes_json_record() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("records").join("result.jsonl");

  let mut links = BuyLinkTable::default();
  links.insert("p15", "https://example.com/p15");
  let output = JsonRecordOutput::create(&path, links).unwrap();

  let frame = RawImage::new(block_image(), Orientation::Deg0).with_source("shoe.png");
  let count = OneShotTask
    .run_task(std::iter::once(frame), probe_classifier(), output)
    .unwrap();
  assert_eq!(count, 1);

  let text = std::fs::read_to_string(&path).unwrap();
  let record: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
  assert_eq!(record["source"], "shoe.png");
  assert_eq!(record["orientation"], 0);
  assert_eq!(record["label"], "p15");
  assert_eq!(record["buy_link"], "https://example.com/p15");
  assert_eq!(record["predictions"].as_object().unwrap().len(), SIDE * SIDE);
}

#[test]
fn continuous_task_classifies_every_frame() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("batch.jsonl");
  let output = JsonRecordOutput::create(&path, BuyLinkTable::sneakers()).unwrap();

  let upright = block_image();
  let frames = vec![
    RawImage::new(upright.clone(), Orientation::Deg0),
    RawImage::new(imageops::rotate90(&upright), Orientation::Deg90),
    RawImage::new(imageops::rotate270(&upright), Orientation::Deg270),
  ];
  let count = ContinuousTask::default()
    .with_interrupt(Default::default())
    .run_task(frames.into_iter(), probe_classifier(), output)
    .unwrap();
  assert_eq!(count, 3);

  let text = std::fs::read_to_string(&path).unwrap();
  let labels: Vec<String> = text
    .lines()
    .map(|line| {
      let record: serde_json::Value = serde_json::from_str(line).unwrap();
      record["label"].as_str().unwrap().to_string()
    })
    .collect();
  assert_eq!(labels, vec!["p15", "p15", "p15"]);
}
