//! # 解码器注册表模块
//!
//! ## 设计思路
//!
//! 编排层只认 `RasterDecoder` 抽象，具体用哪个解码库由注册表决定。
//! 注册表里找不到能处理当前格式的解码器，属于部署问题（缺少编解码插件），直接报 `UnsupportedFormat`。
//!
//! ## 实现思路
//!
//! - `DecoderRegistry::default()` 注册基于 OpenJPEG 的 `Jpeg2kDecoder`。
//! - 解码句柄（`jpeg2k::Image`）只在 `decode` 内部持有，成功或失败返回时都会随作用域 `Drop` 释放。
//! - 先只读码流头部按配置校验尺寸，通过后才解码分量数据，恶意输入不会先触发大块分配。
//! - 按色彩空间解释分量：sYCC 转 RGB、CMYK 转 RGB、e-YCC 不支持；有符号样本先平移到无符号区间。
//! - Alpha 分量以码流标记为准，各分量按精度缩放到 8 bit 后交错成 `DynamicImage`，子采样分量按最近邻映射。

use std::fmt;

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use jpeg2k::{ColorSpace, DumpImage, Image as J2kImage, ImageComponent};

use super::sniff::DetectedFormat;
use super::{ConvertConfig, ConvertError};

/// 栅格解码器：把某种编码格式的字节还原为内存中的像素网格。
///
/// 实现必须无状态（或只读），同一实例会被多个线程同时调用。
pub trait RasterDecoder: Send + Sync {
    /// 解码器名称，用于日志。
    fn name(&self) -> &'static str;

    fn supports(&self, format: &DetectedFormat) -> bool;

    /// 解码首帧（主图像）。
    fn decode(&self, bytes: &[u8], config: &ConvertConfig) -> Result<DynamicImage, ConvertError>;
}

/// 按注册顺序查找可用解码器。
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn RasterDecoder>>,
}

impl DecoderRegistry {
    /// 不含任何解码器的注册表。
    pub fn empty() -> Self {
        Self { decoders: Vec::new() }
    }

    pub fn register<D>(&mut self, decoder: D) -> &mut Self
    where
        D: RasterDecoder + 'static,
    {
        self.decoders.push(Box::new(decoder));
        self
    }

    pub fn find(&self, format: &DetectedFormat) -> Option<&dyn RasterDecoder> {
        self.decoders
            .iter()
            .find(|decoder| decoder.supports(format))
            .map(|decoder| decoder.as_ref())
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Jpeg2kDecoder);
        registry
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decoders.iter().map(|decoder| decoder.name()))
            .finish()
    }
}

/// 校验解码尺寸是否超过配置上限。
pub(crate) fn validate_decoded_limits(
    config: &ConvertConfig,
    width: u32,
    height: u32,
) -> Result<(), ConvertError> {
    let pixels = (width as u64)
        .checked_mul(height as u64)
        .ok_or_else(|| ConvertError::ResourceLimit("图片像素数溢出".to_string()))?;

    if pixels > config.max_decoded_pixels {
        return Err(ConvertError::ResourceLimit(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    let estimated = pixels
        .checked_mul(4)
        .ok_or_else(|| ConvertError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

    if estimated > config.max_decoded_bytes {
        return Err(ConvertError::ResourceLimit(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

/// 基于 `jpeg2k`（OpenJPEG 绑定）的 JPEG2000 解码器，同时处理 JP2 容器与裸 J2K 码流。
#[derive(Debug, Clone, Copy, Default)]
pub struct Jpeg2kDecoder;

impl RasterDecoder for Jpeg2kDecoder {
    fn name(&self) -> &'static str {
        "openjpeg"
    }

    fn supports(&self, format: &DetectedFormat) -> bool {
        format.is_jpeg2000()
    }

    fn decode(&self, bytes: &[u8], config: &ConvertConfig) -> Result<DynamicImage, ConvertError> {
        let handle = DumpImage::from_bytes(bytes)
            .map_err(|e| ConvertError::Decode(format!("JPEG2000 头部读取失败：{}", e)))?;

        // 只读了头部，分量数据尚未分配
        validate_decoded_limits(config, handle.img.orig_width(), handle.img.orig_height())?;

        handle
            .decode()
            .map_err(|e| ConvertError::Decode(format!("JPEG2000 解码失败：{}", e)))?;

        let raster = interleave_components(&handle.img)?;
        log::debug!(
            "🧩 JPEG2000 分量交错完成 - {}x{} 色彩空间: {:?} 分量数: {}",
            handle.img.width(),
            handle.img.height(),
            handle.img.color_space(),
            handle.img.components().len()
        );

        Ok(raster)
    }
}

/// 单个分量平面的只读视图。
struct Plane<'a> {
    data: &'a [i32],
    width: u32,
    height: u32,
    precision: u32,
    signed: bool,
}

impl<'a> Plane<'a> {
    fn new(
        data: &'a [i32],
        width: u32,
        height: u32,
        precision: u32,
        signed: bool,
    ) -> Result<Self, ConvertError> {
        if width == 0 || height == 0 || precision == 0 || precision > MAX_PRECISION {
            return Err(ConvertError::Decode(format!(
                "JPEG2000 分量参数异常：{}x{} 精度 {}",
                width, height, precision
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| ConvertError::ResourceLimit("分量尺寸溢出".to_string()))?;
        if data.len() < expected {
            return Err(ConvertError::Decode(format!(
                "JPEG2000 分量数据不完整：{} / {}",
                data.len(),
                expected
            )));
        }

        Ok(Self { data, width, height, precision, signed })
    }

    fn from_component(component: &'a ImageComponent) -> Result<Self, ConvertError> {
        Self::new(
            component.data(),
            component.width(),
            component.height(),
            component.precision(),
            component.is_signed(),
        )
    }

    /// 以图像坐标取无符号样本值，子采样分量按比例映射到分量坐标。
    fn value(&self, x: u32, y: u32, image_width: u32, image_height: u32) -> u64 {
        let cx = ((x as u64 * self.width as u64) / image_width as u64).min(self.width as u64 - 1);
        let cy = ((y as u64 * self.height as u64) / image_height as u64).min(self.height as u64 - 1);
        let index = (cy * self.width as u64 + cx) as usize;

        unsigned_sample(self.data[index], self.precision, self.signed)
    }

    fn sample(&self, x: u32, y: u32, image_width: u32, image_height: u32) -> u8 {
        scale_to_u8(self.value(x, y, image_width, image_height), self.precision)
    }

    /// 色度分量以零为中心的取值。
    fn centered(&self, x: u32, y: u32, image_width: u32, image_height: u32) -> i64 {
        self.value(x, y, image_width, image_height) as i64 - (1i64 << (self.precision - 1))
    }

    /// 子采样分量比图像本身窄或矮。
    fn is_subsampled(&self, image_width: u32, image_height: u32) -> bool {
        self.width < image_width || self.height < image_height
    }
}

const MAX_PRECISION: u32 = 31;

fn max_sample(precision: u32) -> u64 {
    (1u64 << precision) - 1
}

/// 有符号样本先平移半个量程，再截断到 `[0, 2^precision - 1]`。
fn unsigned_sample(value: i32, precision: u32, signed: bool) -> u64 {
    let value = value as i64;
    let shifted = if signed { value + (1i64 << (precision - 1)) } else { value };
    shifted.clamp(0, max_sample(precision) as i64) as u64
}

/// 按分量精度把样本值缩放到 0~255。
fn scale_to_u8(value: u64, precision: u32) -> u8 {
    let scaled = match precision {
        0 => 0,
        8 => value,
        p if p > 8 => value.checked_shr(p - 8).unwrap_or(0),
        p => value * 255 / max_sample(p),
    };
    scaled.min(255) as u8
}

/// sYCC（BT.601 全量程）转 RGB，`cb`/`cr` 已去中心偏移，结果按亮度精度截断后缩放到 8 bit。
fn ycc_to_rgb(luma: u64, cb: i64, cr: i64, precision: u32) -> [u8; 3] {
    let y = luma as f64;
    let (cb, cr) = (cb as f64, cr as f64);
    let upper = max_sample(precision) as f64;
    let channel = |v: f64| scale_to_u8(v.round().clamp(0.0, upper) as u64, precision);

    [
        channel(y + 1.402 * cr),
        channel(y - 0.344136 * cb - 0.714136 * cr),
        channel(y + 1.772 * cb),
    ]
}

/// CMYK（已缩放到 8 bit）转 RGB：`(255 - ink) * (255 - k) / 255`。
fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let paper = 255 - k as u32;
    let channel = |ink: u8| ((255 - ink as u32) * paper / 255) as u8;
    [channel(c), channel(m), channel(y)]
}

/// 颜色分量的解释方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorModel {
    Gray,
    Rgb,
    Ycc,
    Cmyk,
}

/// 根据色彩空间与颜色分量数决定解释方式。
///
/// 未声明色彩空间时按分量数推断；三分量且色度子采样时按 sYCC 处理（与 OpenJPEG 参考解码器一致）。
fn color_model(
    space: ColorSpace,
    color: &[Plane<'_>],
    width: u32,
    height: u32,
) -> Result<ColorModel, ConvertError> {
    let model = match space {
        ColorSpace::EYCC => {
            return Err(ConvertError::Decode("不支持的 JPEG2000 色彩空间：e-YCC".to_string()));
        }
        ColorSpace::CMYK if color.len() >= 4 => ColorModel::Cmyk,
        ColorSpace::CMYK => {
            return Err(ConvertError::Decode(format!(
                "CMYK 图像颜色分量不足：{}",
                color.len()
            )));
        }
        _ if color.len() < 3 => ColorModel::Gray,
        ColorSpace::Gray => ColorModel::Gray,
        ColorSpace::SYCC => ColorModel::Ycc,
        ColorSpace::SRGB => ColorModel::Rgb,
        ColorSpace::Unknown | ColorSpace::Unspecified => {
            if color[1].is_subsampled(width, height) || color[2].is_subsampled(width, height) {
                ColorModel::Ycc
            } else {
                ColorModel::Rgb
            }
        }
    };
    Ok(model)
}

/// 拆出颜色分量与 Alpha 分量。
///
/// 优先使用码流标记的 Alpha；没有标记时，灰度两分量、RGB 四分量的最后一个分量视为 Alpha。
fn split_alpha<'a>(
    components: &'a [ImageComponent],
    space: ColorSpace,
) -> Result<(Vec<Plane<'a>>, Option<Plane<'a>>), ConvertError> {
    let mut color = Vec::with_capacity(components.len());
    let mut alpha = None;

    for component in components {
        if component.is_alpha() && alpha.is_none() {
            alpha = Some(Plane::from_component(component)?);
        } else if !component.is_alpha() {
            color.push(Plane::from_component(component)?);
        }
    }

    let implicit_alpha = !matches!(space, ColorSpace::CMYK | ColorSpace::EYCC)
        && matches!(color.len(), 2 | 4);
    if alpha.is_none() && implicit_alpha {
        alpha = color.pop();
    }

    if color.is_empty() {
        return Err(ConvertError::Decode("JPEG2000 图像不包含颜色分量".to_string()));
    }
    Ok((color, alpha))
}

/// 按色彩模型交错成 8 bit 栅格：灰度输出 L8/LA8，其余统一转为 RGB8/RGBA8，多余分量忽略。
fn interleave_components(image: &J2kImage) -> Result<DynamicImage, ConvertError> {
    let width = image.width();
    let height = image.height();
    if width == 0 || height == 0 {
        return Err(ConvertError::Decode("JPEG2000 图像尺寸为 0".to_string()));
    }

    let components = image.components();
    if components.is_empty() {
        return Err(ConvertError::Decode("JPEG2000 图像不包含任何分量".to_string()));
    }

    let space = image.color_space();
    let (color, alpha) = split_alpha(components, space)?;
    let model = color_model(space, &color, width, height)?;

    let channels = match model {
        ColorModel::Gray => 1,
        _ => 3,
    } + usize::from(alpha.is_some());
    let capacity = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(channels))
        .ok_or_else(|| ConvertError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;
    let mut raw = Vec::with_capacity(capacity);

    for y in 0..height {
        for x in 0..width {
            let sample = |plane: &Plane<'_>| plane.sample(x, y, width, height);
            match model {
                ColorModel::Gray => raw.push(sample(&color[0])),
                ColorModel::Rgb => raw.extend(color[..3].iter().map(sample)),
                ColorModel::Ycc => raw.extend(ycc_to_rgb(
                    color[0].value(x, y, width, height),
                    color[1].centered(x, y, width, height),
                    color[2].centered(x, y, width, height),
                    color[0].precision,
                )),
                ColorModel::Cmyk => raw.extend(cmyk_to_rgb(
                    sample(&color[0]),
                    sample(&color[1]),
                    sample(&color[2]),
                    sample(&color[3]),
                )),
            }
            if let Some(plane) = &alpha {
                raw.push(sample(plane));
            }
        }
    }

    let raster = match (model, alpha.is_some()) {
        (ColorModel::Gray, false) => {
            GrayImage::from_raw(width, height, raw).map(DynamicImage::ImageLuma8)
        }
        (ColorModel::Gray, true) => {
            GrayAlphaImage::from_raw(width, height, raw).map(DynamicImage::ImageLumaA8)
        }
        (_, false) => RgbImage::from_raw(width, height, raw).map(DynamicImage::ImageRgb8),
        (_, true) => RgbaImage::from_raw(width, height, raw).map(DynamicImage::ImageRgba8),
    };

    raster.ok_or_else(|| ConvertError::Decode("解码后像素数据长度异常".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::test_support::{FixedDecoder, jp2_header};
    use crate::converter::ConvertErrorKind;

    #[test]
    fn default_registry_resolves_both_jpeg2000_aliases() {
        let registry = DecoderRegistry::default();

        for mime in ["image/jp2", "image/jpeg2000"] {
            let decoder = registry
                .find(&DetectedFormat::Jpeg2000 { mime })
                .expect("jpeg2000 decoder should be registered");
            assert_eq!(decoder.name(), "openjpeg");
        }

        assert!(registry.find(&DetectedFormat::Other { mime: Some("image/png") }).is_none());
    }

    #[test]
    fn empty_registry_finds_nothing() {
        let registry = DecoderRegistry::empty();

        assert!(registry.is_empty());
        assert!(registry.find(&DetectedFormat::Jpeg2000 { mime: "image/jp2" }).is_none());
    }

    #[test]
    fn registry_keeps_registration_order() {
        let mut registry = DecoderRegistry::empty();
        registry
            .register(FixedDecoder::new(DynamicImage::new_rgb8(1, 1)))
            .register(Jpeg2kDecoder);

        let decoder = registry
            .find(&DetectedFormat::Jpeg2000 { mime: "image/jp2" })
            .expect("decoder should be found");

        assert_eq!(registry.len(), 2);
        assert_eq!(decoder.name(), "fixed");
        assert_eq!(format!("{:?}", registry), r#"["fixed", "openjpeg"]"#);
    }

    #[test]
    fn openjpeg_rejects_truncated_container() {
        let result = Jpeg2kDecoder.decode(&jp2_header(), &ConvertConfig::default());

        assert_eq!(result.map(|_| ()).unwrap_err().kind(), ConvertErrorKind::DecodeFailure);
    }

    #[test]
    fn openjpeg_rejects_garbage_codestream() {
        let mut bytes = vec![0xFF, 0x4F, 0xFF, 0x51];
        bytes.extend_from_slice(&[0xAB; 32]);

        let result = Jpeg2kDecoder.decode(&bytes, &ConvertConfig::default());

        assert!(matches!(result, Err(ConvertError::Decode(_))));
    }

    #[test]
    fn limits_reject_oversized_dimensions() {
        let mut config = ConvertConfig::default();
        config.max_decoded_pixels = 100;

        assert!(validate_decoded_limits(&config, 10, 10).is_ok());
        assert!(matches!(
            validate_decoded_limits(&config, 11, 10),
            Err(ConvertError::ResourceLimit(_))
        ));

        let mut config = ConvertConfig::default();
        config.max_decoded_bytes = 400;
        assert!(matches!(
            validate_decoded_limits(&config, 11, 10),
            Err(ConvertError::ResourceLimit(_))
        ));
    }

    #[test]
    fn sample_scaling_follows_precision() {
        assert_eq!(scale_to_u8(200, 8), 200);
        assert_eq!(scale_to_u8(4095, 12), 255);
        assert_eq!(scale_to_u8(2048, 12), 128);
        assert_eq!(scale_to_u8(1, 1), 255);
        assert_eq!(scale_to_u8(15, 4), 255);
        assert_eq!(scale_to_u8(300, 8), 255);
        assert_eq!(scale_to_u8(1 << 20, 28), 1);
    }

    #[test]
    fn signed_samples_are_shifted_to_mid_range() {
        assert_eq!(unsigned_sample(0, 8, true), 128);
        assert_eq!(unsigned_sample(-128, 8, true), 0);
        assert_eq!(unsigned_sample(127, 8, true), 255);
        assert_eq!(unsigned_sample(-5, 8, false), 0);
        assert_eq!(unsigned_sample(5000, 12, false), 4095);
    }

    #[test]
    fn ycc_conversion_matches_bt601() {
        let red = ycc_to_rgb(76, 85 - 128, 255 - 128, 8);
        assert!(red[0] >= 250 && red[1] <= 3 && red[2] <= 3, "{:?}", red);

        assert_eq!(ycc_to_rgb(128, 0, 0, 8), [128, 128, 128]);
        assert_eq!(ycc_to_rgb(4095, 0, 0, 12), [255, 255, 255]);
    }

    #[test]
    fn cmyk_conversion_removes_ink() {
        assert_eq!(cmyk_to_rgb(255, 0, 0, 0), [0, 255, 255]);
        assert_eq!(cmyk_to_rgb(0, 0, 0, 255), [0, 0, 0]);
        assert_eq!(cmyk_to_rgb(0, 0, 0, 0), [255, 255, 255]);
    }

    fn decode_fixture(bytes: &[u8]) -> DynamicImage {
        Jpeg2kDecoder
            .decode(bytes, &ConvertConfig::default())
            .expect("fixture should decode")
    }

    #[test]
    fn sycc_container_is_converted_to_rgb() {
        let full = decode_fixture(include_bytes!("../../tests/fixtures/sycc_red_8x8.jp2"));
        let subsampled = decode_fixture(include_bytes!("../../tests/fixtures/sycc420_red_8x8.jp2"));

        for raster in [full, subsampled] {
            let DynamicImage::ImageRgb8(rgb) = raster else {
                panic!("sYCC should decode to RGB8");
            };
            assert_eq!(rgb.dimensions(), (8, 8));
            for pixel in rgb.pixels() {
                assert!(pixel[0] >= 250 && pixel[1] <= 3 && pixel[2] <= 3, "{:?}", pixel);
            }
        }
    }

    #[test]
    fn subsampled_codestream_without_colour_box_is_treated_as_ycc() {
        let raster = decode_fixture(include_bytes!("../../tests/fixtures/ycc420_red_8x8.j2k"));

        let pixel = raster.to_rgb8().get_pixel(7, 7).0;
        assert!(pixel[0] >= 250 && pixel[1] <= 3 && pixel[2] <= 3, "{:?}", pixel);
    }

    #[test]
    fn signed_gray_zero_is_mid_gray() {
        let raster = decode_fixture(include_bytes!("../../tests/fixtures/gray_signed_8x8.jp2"));

        let DynamicImage::ImageLuma8(gray) = raster else {
            panic!("signed gray should decode to L8");
        };
        assert_eq!(gray.get_pixel(0, 0).0, [128]);
        assert_eq!(gray.get_pixel(7, 7).0, [0]);
    }

    #[test]
    fn twelve_bit_gray_is_scaled_down() {
        let raster = decode_fixture(include_bytes!("../../tests/fixtures/gray_12bit_8x8.jp2"));

        let gray = raster.to_luma8();
        assert_eq!(gray.get_pixel(0, 0).0, [255]);
        assert_eq!(gray.get_pixel(7, 0).0, [128]);
    }

    #[test]
    fn flagged_alpha_component_becomes_alpha_channel() {
        let raster = decode_fixture(include_bytes!("../../tests/fixtures/rgba_transparent_4x4.jp2"));

        let DynamicImage::ImageRgba8(rgba) = raster else {
            panic!("flagged alpha should decode to RGBA8");
        };
        assert!(rgba.pixels().all(|p| p.0 == [12, 34, 56, 0]));
    }

    #[test]
    fn cmyk_is_not_mistaken_for_rgba() {
        let raster = decode_fixture(include_bytes!("../../tests/fixtures/cmyk_cyan_4x4.jp2"));

        let DynamicImage::ImageRgb8(rgb) = raster else {
            panic!("CMYK should decode to RGB8");
        };
        assert!(rgb.pixels().all(|p| p.0 == [0, 255, 255]));
    }

    #[test]
    fn eycc_is_rejected_as_decode_failure() {
        let result = Jpeg2kDecoder.decode(
            include_bytes!("../../tests/fixtures/eycc_4x4.jp2"),
            &ConvertConfig::default(),
        );

        assert!(matches!(result, Err(ConvertError::Decode(_))));
    }

    #[test]
    fn header_dimensions_are_checked_before_decoding() {
        let mut config = ConvertConfig::default();
        config.max_decoded_pixels = 63;

        let bytes = include_bytes!("../../tests/fixtures/gray_12bit_8x8.jp2");

        let result = Jpeg2kDecoder.decode(bytes, &config);

        assert!(matches!(result, Err(ConvertError::ResourceLimit(_))));
    }
}
