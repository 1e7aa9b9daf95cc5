//! # JPEG2000 转 JPEG 工具 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 调用方（任意服务 / 批处理）                │
//! └───────────────┬──────────────────────────────────────────┘
//!                 ↓ convert(&[u8]) -> Result<Cow<[u8]>, ConvertError>
//! ┌───────────────┼──────────────────────────────────────────┐
//! │  converter    ↓                                          │
//! │  ├─ sniff ───── infer + JPEG2000 自定义匹配器              │
//! │  ├─ decoder ─── DecoderRegistry → Jpeg2kDecoder (OpenJPEG)│
//! │  ├─ flatten ─── 白底 source-over 去 Alpha                 │
//! │  └─ encoder ─── image::codecs::jpeg                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`converter`] | 转换器、配置、错误类型，以及各阶段子模块 |
//! | [`sniff`] | 基于内容的格式识别 |
//! | [`decoder`] | 解码器抽象、注册表与 JPEG2000 解码实现 |
//! | [`flatten`] | Alpha 通道合成到背景色 |
//! | [`encoder`] | JPEG 编码 |
//!
//! 库本身不初始化日志后端，只通过 `log` 门面输出；由宿主程序决定使用哪个 logger。

pub mod converter;

pub use converter::{
    ConvertConfig, ConvertError, ConvertErrorKind, DecoderRegistry, DetectedFormat,
    ImageConverter, Jpeg2kDecoder, QualityProfile, RasterDecoder, decoder, encoder, flatten,
    sniff,
};
