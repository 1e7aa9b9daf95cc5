//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载转换链路中的所有失败分支（参数 / 解码器缺失 / 解码 / 编码 / 资源限制），
//! 调用侧可以按分支匹配，也可以只看 `kind()` 做粗粒度判断。
//! 通过 `thiserror` 保持人类可读错误，所有错误同步返回给 `convert` 的调用方，不在内部吞掉。

/// 图片转换统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("参数错误：{0}")]
    InvalidArgument(String),

    #[error("格式不受支持：{0}")]
    UnsupportedFormat(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("编码错误：{0}")]
    Encode(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),
}

/// 不携带消息的错误分类，便于断言与上层路由。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertErrorKind {
    InvalidArgument,
    UnsupportedFormat,
    DecodeFailure,
    EncodeFailure,
    ResourceLimit,
}

impl ConvertError {
    pub fn kind(&self) -> ConvertErrorKind {
        match self {
            Self::InvalidArgument(_) => ConvertErrorKind::InvalidArgument,
            Self::UnsupportedFormat(_) => ConvertErrorKind::UnsupportedFormat,
            Self::Decode(_) => ConvertErrorKind::DecodeFailure,
            Self::Encode(_) => ConvertErrorKind::EncodeFailure,
            Self::ResourceLimit(_) => ConvertErrorKind::ResourceLimit,
        }
    }
}

impl From<ConvertError> for String {
    fn from(error: ConvertError) -> Self {
        error.to_string()
    }
}
