// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use xieshi::{
  frame::Orientation,
  input::ImageFileInput,
  model::ClassifierBuilder,
  output::{ConsoleOutput, buy_link::BuyLinkTable},
  task::{OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入图像: {}", args.image);
  info!("拍摄方向: {}", args.orientation);

  let orientation = Orientation::from_degrees(args.orientation)?;

  let builder = match &args.labels {
    Some(labels) => ClassifierBuilder::new(&args.model).labels(labels),
    None => ClassifierBuilder::new(&args.model),
  };
  info!("标签文件路径: {}", builder.labels_path().display());
  let classifier = builder.build()?;

  let input = ImageFileInput::open(&args.image, orientation)?;
  let links = BuyLinkTable::from_optional_file(args.links.as_deref())?;
  let output = ConsoleOutput::new(links, args.top);

  OneShotTask.run_task(input, classifier, output)?;

  Ok(())
}
