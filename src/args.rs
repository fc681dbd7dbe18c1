// 该文件是 Xieshi （鞋识） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;

/// Xieshi 鞋款识别
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TFLite 模型文件路径
  #[arg(long, value_name = "FILE")]
  pub model: String,

  /// 标签文件路径，每行一个标签；缺省时使用模型同目录下的 labels.txt
  #[arg(long, value_name = "FILE")]
  pub labels: Option<String>,

  /// 待识别的图像文件（jpg / png）
  #[arg(long, value_name = "IMAGE")]
  pub image: String,

  /// 拍摄时传感器方向，必须是 90 的倍数
  #[arg(long, default_value = "0", value_name = "DEGREES", allow_negative_numbers = true)]
  pub orientation: i32,

  /// 显示概率最高的前几项
  #[arg(long, default_value = "1", value_name = "COUNT")]
  pub top: usize,

  /// 购买链接表（JSON 对象：标签 -> 链接）；缺省时使用内置链接
  #[arg(long, value_name = "FILE")]
  pub links: Option<String>,
}
