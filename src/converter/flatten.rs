//! # 去透明模块
//!
//! ## 设计思路
//!
//! JPEG 没有透明通道，带 Alpha 的栅格直接交给编码器会得到实现相关的黑底或偏色。
//! 因此先铺一张同尺寸的不透明背景（默认白色），再把原图以 source-over 方式叠上去。
//!
//! ## 实现思路
//!
//! - 无 Alpha：原样返回，不做拷贝。
//! - 有 Alpha：统一展开成 8 bit RGBA，逐像素按 `out = src * a + bg * (1 - a)` 混合，结果为 RGB。
//! - 混合使用整数运算并四舍五入，不追求与任何特定图形库逐位一致。

use image::{DynamicImage, Rgb, RgbImage};

/// 栅格的像素格式是否带 Alpha 通道。
pub fn has_alpha(image: &DynamicImage) -> bool {
    image.color().has_alpha()
}

/// 单通道 source-over 混合（非预乘 Alpha）。
#[inline]
fn blend_channel(source: u8, background: u8, alpha: u8) -> u8 {
    let alpha = alpha as u32;
    ((source as u32 * alpha + background as u32 * (255 - alpha) + 127) / 255) as u8
}

/// 去除 Alpha 通道，透明区域按权重露出 `background`。
///
/// # 示例
/// ```rust
/// use image::{DynamicImage, Rgba, RgbaImage};
/// use jp2_converter::flatten::{flatten_alpha, has_alpha};
///
/// let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
/// let flattened = flatten_alpha(transparent, [255, 255, 255]);
///
/// assert!(!has_alpha(&flattened));
/// assert_eq!(flattened.to_rgb8().get_pixel(1, 1).0, [255, 255, 255]);
/// ```
pub fn flatten_alpha(image: DynamicImage, background: [u8; 3]) -> DynamicImage {
    if !has_alpha(&image) {
        return image;
    }

    let source = image.to_rgba8();
    let (width, height) = source.dimensions();
    let mut flattened = RgbImage::from_pixel(width, height, Rgb(background));

    for (target, pixel) in flattened.pixels_mut().zip(source.pixels()) {
        let [r, g, b, a] = pixel.0;
        target.0 = [
            blend_channel(r, background[0], a),
            blend_channel(g, background[1], a),
            blend_channel(b, background[2], a),
        ];
    }

    DynamicImage::ImageRgb8(flattened)
}
