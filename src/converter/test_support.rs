use image::DynamicImage;

use super::sniff::DetectedFormat;
use super::{ConvertConfig, ConvertError, RasterDecoder};

/// 无论输入如何都返回同一张栅格的解码器，只认 JPEG2000。
pub(crate) struct FixedDecoder {
    image: DynamicImage,
}

impl FixedDecoder {
    pub(crate) fn new(image: DynamicImage) -> Self {
        Self { image }
    }
}

impl RasterDecoder for FixedDecoder {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn supports(&self, format: &DetectedFormat) -> bool {
        format.is_jpeg2000()
    }

    fn decode(&self, _bytes: &[u8], _config: &ConvertConfig) -> Result<DynamicImage, ConvertError> {
        Ok(self.image.clone())
    }
}

/// JP2 签名盒 + ftyp 盒，之后没有任何码流数据。
pub(crate) fn jp2_header() -> Vec<u8> {
    let mut bytes = vec![
        0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
    ];
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x14, b'f', b't', b'y', b'p']);
    bytes.extend_from_slice(b"jp2 \0\0\0\0jp2 ");
    bytes
}

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
