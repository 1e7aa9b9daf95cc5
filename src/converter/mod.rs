//! # 图片转换模块（converter）
//!
//! ## 设计思路
//!
//! 该模块将“格式嗅探 → 条件解码 → 去透明 → JPEG 编码”按职责拆分为多个子模块，
//! 每个阶段都可以单独测试，编排层只负责串联与计时。
//!
//! - `sniff`：基于内容的 MIME 识别，两个 JPEG2000 MIME 互为同义
//! - `decoder`：解码器抽象与注册表，默认使用 OpenJPEG
//! - `flatten`：白底 source-over 合成，去除 Alpha
//! - `encoder`：不透明栅格编码为 JPEG
//! - `handler`：编排整条处理流水线
//! - `config/error`：配置与错误
//!
//! ## 新同事快速上手
//!
//! ```text
//! ImageConverter::convert(bytes)
//!    ├─ 空数据 → InvalidArgument
//!    ├─ sniff.rs（非 JPEG2000 → 原样借用返回）
//!    ├─ decoder.rs（注册表查找 → 解码首帧）
//!    ├─ flatten.rs（有 Alpha 才合成白底）
//!    └─ encoder.rs（JPEG 字节）
//! ```

mod config;
pub mod decoder;
pub mod encoder;
mod error;
pub mod flatten;
mod handler;
pub mod sniff;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConvertConfig, QualityProfile};
pub use decoder::{DecoderRegistry, Jpeg2kDecoder, RasterDecoder};
pub use error::{ConvertError, ConvertErrorKind};
pub use handler::ImageConverter;
pub use sniff::DetectedFormat;
