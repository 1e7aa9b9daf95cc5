//! # 格式嗅探模块
//!
//! ## 设计思路
//!
//! 只信任内容本身（magic bytes），不信任外部传入的扩展名或 Content-Type。
//! JPEG2000 有两种常见形态，对应两个被视为同义的 MIME：
//!
//! - `image/jp2`：JP2 容器，以 12 字节签名盒开头
//! - `image/jpeg2000`：裸 J2K 码流（SOC + SIZ 标记），部分生产方直接输出
//!
//! ## 实现思路
//!
//! 复用 `infer` 的内置匹配器识别常见格式，并注册两个自定义匹配器覆盖上述两种形态。
//! 匹配器表每次调用现建，不引入全局状态。

/// JP2 签名盒：长度 12、类型 `jP  `、内容 `<CR><LF><0x87><LF>`。
const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];

/// 裸码流起始：SOC (FF4F) 紧跟 SIZ (FF51)。
const J2K_CODESTREAM_START: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

pub const JPEG2000_MIME_TYPE: &str = "image/jp2";
pub const JPEG2000_SECONDARY_MIME_TYPE: &str = "image/jpeg2000";

/// 单次嗅探的分类结果，不做持久化。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedFormat {
    Jpeg2000 { mime: &'static str },
    Other { mime: Option<&'static str> },
}

impl DetectedFormat {
    pub fn is_jpeg2000(&self) -> bool {
        matches!(self, Self::Jpeg2000 { .. })
    }

    /// 用于日志的 MIME 描述，无法识别时为 `unknown`。
    pub fn mime(&self) -> &'static str {
        match *self {
            Self::Jpeg2000 { mime } => mime,
            Self::Other { mime } => mime.unwrap_or("unknown"),
        }
    }
}

fn is_jp2_container(buf: &[u8]) -> bool {
    buf.starts_with(&JP2_SIGNATURE)
}

fn is_j2k_codestream(buf: &[u8]) -> bool {
    buf.starts_with(&J2K_CODESTREAM_START)
}

/// 基于内容猜测 MIME，无法识别时返回 `None`。
pub fn detect_mime(bytes: &[u8]) -> Option<&'static str> {
    let mut matchers = infer::Infer::new();
    matchers.add(JPEG2000_MIME_TYPE, "jp2", is_jp2_container);
    matchers.add(JPEG2000_SECONDARY_MIME_TYPE, "j2k", is_j2k_codestream);

    matchers.get(bytes).map(|kind| kind.mime_type())
}

/// 两个 JPEG2000 MIME 互为同义。
pub fn is_jpeg2000_mime(mime: &str) -> bool {
    mime == JPEG2000_MIME_TYPE || mime == JPEG2000_SECONDARY_MIME_TYPE
}

pub fn detect_format(bytes: &[u8]) -> DetectedFormat {
    match detect_mime(bytes) {
        Some(mime) if is_jpeg2000_mime(mime) => DetectedFormat::Jpeg2000 { mime },
        mime => DetectedFormat::Other { mime },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::test_support::jp2_header;

    #[test]
    fn jp2_container_is_jpeg2000() {
        let detected = detect_format(&jp2_header());

        assert!(detected.is_jpeg2000());
        assert_eq!(detected.mime(), JPEG2000_MIME_TYPE);
    }

    #[test]
    fn raw_codestream_is_secondary_alias() {
        let bytes = [0xFF, 0x4F, 0xFF, 0x51, 0x00, 0x2F, 0x00, 0x00];

        assert_eq!(
            detect_format(&bytes),
            DetectedFormat::Jpeg2000 { mime: JPEG2000_SECONDARY_MIME_TYPE }
        );
    }

    #[test]
    fn plain_text_is_other() {
        let detected = detect_format(b"not-a-jpeg2000");

        assert!(!detected.is_jpeg2000());
    }

    #[test]
    fn png_signature_is_other_image() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];

        assert_eq!(detect_format(&png), DetectedFormat::Other { mime: Some("image/png") });
    }

    #[test]
    fn truncated_signature_is_not_jpeg2000() {
        assert!(!detect_format(&JP2_SIGNATURE[..8]).is_jpeg2000());
        assert!(!detect_format(&[0xFF, 0x4F]).is_jpeg2000());
    }

    #[test]
    fn mime_aliases_are_recognized() {
        assert!(is_jpeg2000_mime("image/jp2"));
        assert!(is_jpeg2000_mime("image/jpeg2000"));
        assert!(!is_jpeg2000_mime("image/jpeg"));
    }
}
