//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageConverter` 只负责流程编排，处理链路固定为：
//! 1. 入参校验（空数据直接拒绝，不做嗅探）
//! 2. 内容嗅探：非 JPEG2000 原样借用返回，不产生拷贝
//! 3. 从注册表取解码器，解码首帧
//! 4. 去除 Alpha（白底 source-over）
//! 5. 编码为 JPEG
//!
//! ## 实现思路
//!
//! - 转换器只持有不可变配置与无状态解码器，可以跨线程共享同一实例。
//! - 每次调用独立，解码句柄在解码器内部随作用域释放。
//! - 记录 `sniff/decode/flatten/encode/total` 阶段耗时，便于性能诊断。

use std::borrow::Cow;
use std::time::Instant;

use super::decoder::{DecoderRegistry, validate_decoded_limits};
use super::encoder::encode_jpeg;
use super::flatten::{flatten_alpha, has_alpha};
use super::sniff::{self, DetectedFormat};
use super::{ConvertConfig, ConvertError};

/// JPEG2000 → JPEG 转换器。
#[derive(Debug, Default)]
pub struct ImageConverter {
    config: ConvertConfig,
    registry: DecoderRegistry,
}

impl ImageConverter {
    /// 默认配置 + 默认解码器注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义配置创建转换器，配置非法时返回 `InvalidArgument`。
    ///
    /// # 示例
    /// ```rust
    /// use jp2_converter::{ConvertConfig, ImageConverter, QualityProfile};
    ///
    /// let mut config = ConvertConfig::default();
    /// config.apply_quality_profile(QualityProfile::High);
    /// let converter = ImageConverter::with_config(config)?;
    /// assert_eq!(converter.config().jpeg_quality, 92);
    /// # Ok::<(), jp2_converter::ConvertError>(())
    /// ```
    pub fn with_config(config: ConvertConfig) -> Result<Self, ConvertError> {
        Self::with_registry(config, DecoderRegistry::default())
    }

    /// 同时注入解码器注册表。
    pub fn with_registry(
        config: ConvertConfig,
        registry: DecoderRegistry,
    ) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// 只做内容嗅探，不解码。
    pub fn detect(&self, image_data: &[u8]) -> DetectedFormat {
        sniff::detect_format(image_data)
    }

    /// 兼容“可能缺省”的输入，`None` 与空数据同样视为参数错误。
    pub fn convert_optional<'a>(
        &self,
        image_data: Option<&'a [u8]>,
    ) -> Result<Cow<'a, [u8]>, ConvertError> {
        match image_data {
            Some(bytes) => self.convert(bytes),
            None => Err(ConvertError::InvalidArgument("图片数据不能为空".to_string())),
        }
    }

    /// 处理主入口：JPEG2000 转为 JPEG，其他内容原样返回。
    ///
    /// # 示例
    /// ```rust
    /// use std::borrow::Cow;
    /// use jp2_converter::ImageConverter;
    ///
    /// let converter = ImageConverter::new();
    /// let output = converter.convert(b"not-a-jpeg2000")?;
    /// assert!(matches!(output, Cow::Borrowed(b"not-a-jpeg2000")));
    /// # Ok::<(), jp2_converter::ConvertError>(())
    /// ```
    pub fn convert<'a>(&self, image_data: &'a [u8]) -> Result<Cow<'a, [u8]>, ConvertError> {
        if image_data.is_empty() {
            return Err(ConvertError::InvalidArgument("图片数据不能为空".to_string()));
        }

        let total_start = Instant::now();
        let format = sniff::detect_format(image_data);
        let sniff_elapsed = total_start.elapsed();

        if !format.is_jpeg2000() {
            log::info!(
                "🖼️ 非 JPEG2000 图片（{}），原样返回 {} 字节",
                format.mime(),
                image_data.len()
            );
            return Ok(Cow::Borrowed(image_data));
        }

        log::info!(
            "🔄 检测到 JPEG2000（{}），开始转换 - 输入 {} 字节 sniff={}ms",
            format.mime(),
            image_data.len(),
            sniff_elapsed.as_millis()
        );
        self.validate_input_size(image_data)?;

        let decode_start = Instant::now();
        let decoded = self.decode_primary_frame(image_data, &format)?;
        let decode_elapsed = decode_start.elapsed();

        let (width, height) = (decoded.width(), decoded.height());
        validate_decoded_limits(&self.config, width, height)?;

        let flatten_start = Instant::now();
        let had_alpha = has_alpha(&decoded);
        let opaque = flatten_alpha(decoded, self.config.background);
        let flatten_elapsed = flatten_start.elapsed();

        let encode_start = Instant::now();
        let jpeg = encode_jpeg(&opaque, self.config.jpeg_quality)?;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ JPEG2000 转换完成 - 尺寸: {}x{} alpha={} 输出={}KB sniff={}ms decode={}ms flatten={}ms encode={}ms total={}ms",
            width,
            height,
            had_alpha,
            jpeg.len() / 1024,
            sniff_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            flatten_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(Cow::Owned(jpeg))
    }

    fn validate_input_size(&self, image_data: &[u8]) -> Result<(), ConvertError> {
        let size = image_data.len() as u64;
        if size > self.config.max_input_bytes {
            return Err(ConvertError::ResourceLimit(format!(
                "JPEG2000 数据过大：{:.2} MB（限制：{:.2} MB）",
                size as f64 / 1024.0 / 1024.0,
                self.config.max_input_bytes as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    fn decode_primary_frame(
        &self,
        image_data: &[u8],
        format: &DetectedFormat,
    ) -> Result<image::DynamicImage, ConvertError> {
        let decoder = self.registry.find(format).ok_or_else(|| {
            ConvertError::UnsupportedFormat(format!(
                "未找到可处理 {} 的解码器",
                format.mime()
            ))
        })?;

        log::debug!("🔍 使用解码器：{}", decoder.name());
        decoder.decode(image_data, &self.config)
    }
}
