//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ConvertConfig`：JPEG 质量、去透明背景色、以及解码阶段的资源上限。
//! 质量档位（high / balanced / compact）作为高层语义，映射到具体的 JPEG 质量值。
//!
//! ## 实现思路
//!
//! - `Default` 提供常见 JPEG 写入器的默认质量（75）与白色背景。
//! - `QualityProfile` 负责档位字符串解析与反向输出。
//! - `apply_quality_profile` 将档位转换为具体质量值，`quality_profile` 反推当前档位。
//! - `from_json` 支持只写部分字段，缺省字段回落到默认值。

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConvertError;

const HIGH_QUALITY: u8 = 92;
const BALANCED_QUALITY: u8 = 75;
const COMPACT_QUALITY: u8 = 60;

/// 图片转换配置。
///
/// 资源上限只作用于 JPEG2000 分支，透传分支永远不会因为体积被拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// JPEG 编码质量（1~100）。
    pub jpeg_quality: u8,
    /// 去除 Alpha 通道时铺底的背景色（RGB）。
    pub background: [u8; 3],
    /// JPEG2000 输入允许的最大字节数。
    pub max_input_bytes: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: BALANCED_QUALITY,
            background: [255, 255, 255],
            max_input_bytes: 64 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
        }
    }
}

/// JPEG 输出质量档位。
///
/// - `High`：尽量保真
/// - `Balanced`：质量与体积平衡
/// - `Compact`：优先输出体积
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityProfile {
    High,
    Balanced,
    Compact,
}

impl FromStr for QualityProfile {
    type Err = ConvertError;

    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use jp2_converter::QualityProfile;
    ///
    /// let p: QualityProfile = " Balanced ".parse()?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), jp2_converter::ConvertError>(())
    /// ```
    fn from_str(profile: &str) -> Result<Self, Self::Err> {
        match profile.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "balanced" => Ok(Self::Balanced),
            "compact" => Ok(Self::Compact),
            other => Err(ConvertError::InvalidArgument(format!(
                "未知质量档位：{}（可选：high / balanced / compact）",
                other
            ))),
        }
    }
}

impl QualityProfile {
    /// 将档位输出为稳定字符串，供日志与持久化使用。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Balanced => "balanced",
            Self::Compact => "compact",
        }
    }

    fn quality(self) -> u8 {
        match self {
            Self::High => HIGH_QUALITY,
            Self::Balanced => BALANCED_QUALITY,
            Self::Compact => COMPACT_QUALITY,
        }
    }
}

impl ConvertConfig {
    /// 从 JSON 文本读取配置，缺省字段使用默认值，读取后立即校验。
    ///
    /// # 示例
    /// ```rust
    /// use jp2_converter::ConvertConfig;
    ///
    /// let config = ConvertConfig::from_json(r#"{ "jpeg_quality": 90 }"#)?;
    /// assert_eq!(config.jpeg_quality, 90);
    /// assert_eq!(config.background, [255, 255, 255]);
    /// # Ok::<(), jp2_converter::ConvertError>(())
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ConvertError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| ConvertError::InvalidArgument(format!("配置解析失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConvertError::InvalidArgument(format!(
                "jpeg_quality 必须在 1~100 之间（当前：{}）",
                self.jpeg_quality
            )));
        }
        if self.max_input_bytes == 0 {
            return Err(ConvertError::InvalidArgument("max_input_bytes 不能为 0".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ConvertError::InvalidArgument("max_decoded_pixels 不能为 0".to_string()));
        }
        if self.max_decoded_bytes == 0 {
            return Err(ConvertError::InvalidArgument("max_decoded_bytes 不能为 0".to_string()));
        }
        Ok(())
    }

    /// 基于当前质量值反推档位。
    pub fn quality_profile(&self) -> QualityProfile {
        if self.jpeg_quality >= HIGH_QUALITY {
            QualityProfile::High
        } else if self.jpeg_quality <= COMPACT_QUALITY {
            QualityProfile::Compact
        } else {
            QualityProfile::Balanced
        }
    }

    /// 应用指定质量档位到实际参数。
    pub fn apply_quality_profile(&mut self, profile: QualityProfile) {
        self.jpeg_quality = profile.quality();
    }
}
