//! # JPEG 编码模块
//!
//! 只接受不透明的 8 bit 灰度或 RGB 栅格；其他像素格式视为调用链路错误，直接报 `Encode`，
//! 错误信息中带上目标格式名称。

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

use super::ConvertError;

/// 目标格式名称，出现在编码错误信息里。
pub const TARGET_FORMAT: &str = "JPEG";

/// 将栅格编码为基线 JPEG 字节。
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ConvertError> {
    let mut bytes = Vec::new();
    let result = {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        match image {
            DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
            DynamicImage::ImageRgb8(rgb) => encoder.encode_image(rgb),
            other => {
                return Err(ConvertError::Encode(format!(
                    "{} 编码器不支持像素格式：{:?}",
                    TARGET_FORMAT,
                    other.color()
                )));
            }
        }
    };

    result.map_err(|e| ConvertError::Encode(format!("{} 编码失败：{}", TARGET_FORMAT, e)))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn rgb_raster_encodes_to_jpeg() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb([200, 10, 10])));

        let bytes = encode_jpeg(&image, 90).expect("rgb should encode");

        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
        let decoded = image::load_from_memory(&bytes).expect("output should decode");
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn gray_raster_stays_gray() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([90])));

        let bytes = encode_jpeg(&image, 75).expect("gray should encode");
        let decoded = image::load_from_memory(&bytes).expect("output should decode");

        assert!(matches!(decoded, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn alpha_raster_is_rejected_with_target_name() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));

        let err = encode_jpeg(&image, 75).unwrap_err();

        assert!(matches!(err, ConvertError::Encode(ref msg) if msg.contains(TARGET_FORMAT)));
    }

    #[test]
    fn sixteen_bit_raster_is_rejected() {
        let image = DynamicImage::new_rgb16(2, 2);

        assert!(matches!(encode_jpeg(&image, 75), Err(ConvertError::Encode(_))));
    }
}
