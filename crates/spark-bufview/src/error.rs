//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义缓冲协商、视图访问与释放路径上的全部错误语义，调用方只需面对一个 [`BufferError`]；
//! - 将“导出方无法满足能力请求”与“导出方 I/O / 分配失败”区分为 [`ExportError`] 的不同分支，
//!   但对外统一以 [`BufferError::NegotiationFailed`] 呈现，保持失败信号单一。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，与 `std::error::Error` 生态兼容；
//! - 每个变体都映射到 [`codes`] 中的稳定错误码，日志与告警据此聚合，而不是解析消息文本；
//! - 可恢复错误（协商失败）与编程错误（重复释放、越界）在分类上明确区分，见 [`BufferError::is_recoverable`]。

use thiserror::Error;

use crate::alias::AliasError;
use crate::flags::BufferFlags;

/// 稳定错误码集合，遵循 `<域>.<语义>` 命名约定。
///
/// - **意图 (Why)**：日志、指标与测试通过错误码匹配错误，避免依赖自然语言消息；
/// - **契约 (What)**：码值一经发布不得修改，新增错误需追加新码值。
pub mod codes {
    pub const NEGOTIATION_UNAVAILABLE: &str = "bufview.negotiation.unavailable";
    pub const NEGOTIATION_IO: &str = "bufview.negotiation.io";
    pub const NEGOTIATION_ALLOCATION: &str = "bufview.negotiation.allocation";
    pub const NEGOTIATION_MALFORMED: &str = "bufview.negotiation.malformed";
    pub const DESCRIPTOR_MISMATCH: &str = "bufview.descriptor.mismatch";
    pub const INVALID_STATE: &str = "bufview.lease.invalid_state";
    pub const BOUNDS_VIOLATION: &str = "bufview.view.bounds";
    pub const DIMENSION_MISMATCH: &str = "bufview.view.dimension_mismatch";
    pub const READ_ONLY: &str = "bufview.view.read_only";
    pub const FORMAT_MISMATCH: &str = "bufview.view.format_mismatch";
    pub const ITEMSIZE_MISMATCH: &str = "bufview.view.itemsize_mismatch";
    pub const INDIRECT_UNSUPPORTED: &str = "bufview.view.indirect_unsupported";
    pub const ALIAS: &str = "bufview.alias.invalid_region";
    pub const UNKNOWN_FLAGS: &str = "bufview.flags.unknown";
    pub const CONFIG: &str = "bufview.config.invalid";
}

/// 导出方在填充描述符时报告的失败原因。
///
/// # 教案式说明
/// - **意图 (Why)**：导出方可能因为“能力不匹配”拒绝请求，也可能因为底层 I/O 或内存分配失败；
///   两者对消费方的处置不同（前者可换一组更宽松的标志重试，后者通常不可重试），因此需要保留区分。
/// - **契约 (What)**：`Unavailable` 等价于 CPython 的 `BufferError`；其余分支代表与标志无关的故障。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ExportError {
    /// 导出方无法以请求的形态提供缓冲，例如只读存储上请求 `WRITABLE`。
    #[error("buffer unavailable: {reason}")]
    Unavailable { reason: String },

    /// 导出方底层 I/O 失败（如映射文件失效）。
    #[error("exporter i/o failure: {detail}")]
    Io { detail: String },

    /// 导出方为描述符元数据分配内存失败。
    ///
    /// `requested` 仅在导出方报告了申请大小时存在。
    #[error("exporter failed to allocate {}", allocation_size(.requested))]
    Allocation { requested: Option<usize> },

    /// 导出方返回的原始记录无法解读（负长度、非 UTF-8 格式串等）。
    #[error("exporter produced a malformed descriptor: {detail}")]
    Malformed { detail: String },
}

impl ExportError {
    /// 以任意可转为 `String` 的原因构造 `Unavailable`。
    pub fn unavailable(reason: impl Into<String>) -> Self {
        ExportError::Unavailable {
            reason: reason.into(),
        }
    }

    /// 是否为“能力不匹配”类失败。
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ExportError::Unavailable { .. })
    }

    /// 返回对应的稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ExportError::Unavailable { .. } => codes::NEGOTIATION_UNAVAILABLE,
            ExportError::Io { .. } => codes::NEGOTIATION_IO,
            ExportError::Allocation { .. } => codes::NEGOTIATION_ALLOCATION,
            ExportError::Malformed { .. } => codes::NEGOTIATION_MALFORMED,
        }
    }
}

/// `spark-bufview` 对外暴露的统一错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：协商、别名、视图访问与释放共享同一错误类型，`?` 可以贯穿整条调用链；
/// - **契约 (What)**：
///   - `NegotiationFailed` 是唯一的可恢复错误，调用方可换用其它标志重试；
///   - `InvalidState`、`BoundsViolation` 等属于编程错误，调用方不应尝试恢复，只需修正调用序列；
///   - 所有变体满足 `Send + Sync + 'static`，可跨线程上报。
/// - **执行逻辑 (How)**：[`code`](Self::code) 给出稳定错误码，`Display` 给出可读描述。
#[derive(Debug, Error)]
pub enum BufferError {
    /// 导出方拒绝或无法完成协商；失败的协商不会留下任何需要释放的状态。
    #[error("negotiation failed for flags {flags}: {source}")]
    NegotiationFailed {
        flags: BufferFlags,
        #[source]
        source: ExportError,
    },

    /// 导出方返回的描述符与请求的标志不一致（导出方违反契约）。
    #[error("exporter returned a descriptor inconsistent with flags {flags}: {detail}")]
    DescriptorMismatch { flags: BufferFlags, detail: String },

    /// 在已释放的租约上执行操作，或重复释放。
    #[error("`{operation}` is not permitted after the buffer has been released")]
    InvalidState { operation: &'static str },

    /// 访问超出 `[0, len)`。
    #[error("index {index} out of bounds for view of length {len}")]
    BoundsViolation { index: usize, len: usize },

    /// 多维索引的维数与描述符不一致。
    #[error("index has {actual} dimensions but the view has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 在只读描述符上请求可变访问。
    #[error("buffer is read-only; `{operation}` requires a writable view")]
    ReadOnly { operation: &'static str },

    /// 描述符格式与请求的元素类型不兼容。
    #[error("format `{actual}` is not compatible with element format `{expected}`")]
    FormatMismatch {
        expected: &'static str,
        actual: String,
    },

    /// 描述符 `itemsize` 或总长度与元素类型不兼容。
    #[error("itemsize {itemsize} / length {len} cannot be viewed as elements of {expected} bytes")]
    ItemSizeMismatch {
        expected: usize,
        itemsize: usize,
        len: usize,
    },

    /// 描述符携带有效 suboffsets，逐项访问需要跨越导出区域之外的间接指针。
    #[error("descriptor uses suboffsets; indirect item access is not supported")]
    IndirectUnsupported,

    /// 原始指针与长度无法构成合法切片。
    #[error(transparent)]
    Alias(#[from] AliasError),

    /// 标志位包含未定义的比特。
    #[error("flag bits {bits:#x} contain undefined capability bits")]
    UnknownFlags { bits: i32 },

    /// 协商策略配置无效。
    #[error("invalid negotiation policy: {detail}")]
    Config { detail: String },
}

fn allocation_size(requested: &Option<usize>) -> String {
    match requested {
        Some(bytes) => format!("{bytes} bytes"),
        None => "memory".to_owned(),
    }
}

impl BufferError {
    /// 返回稳定错误码。
    ///
    /// 协商失败时沿用导出方失败原因的码值，使“能力不匹配”与“I/O 故障”在观测侧可区分。
    pub fn code(&self) -> &'static str {
        match self {
            BufferError::NegotiationFailed { source, .. } => source.code(),
            BufferError::DescriptorMismatch { .. } => codes::DESCRIPTOR_MISMATCH,
            BufferError::InvalidState { .. } => codes::INVALID_STATE,
            BufferError::BoundsViolation { .. } => codes::BOUNDS_VIOLATION,
            BufferError::DimensionMismatch { .. } => codes::DIMENSION_MISMATCH,
            BufferError::ReadOnly { .. } => codes::READ_ONLY,
            BufferError::FormatMismatch { .. } => codes::FORMAT_MISMATCH,
            BufferError::ItemSizeMismatch { .. } => codes::ITEMSIZE_MISMATCH,
            BufferError::IndirectUnsupported => codes::INDIRECT_UNSUPPORTED,
            BufferError::Alias(_) => codes::ALIAS,
            BufferError::UnknownFlags { .. } => codes::UNKNOWN_FLAGS,
            BufferError::Config { .. } => codes::CONFIG,
        }
    }

    /// 是否为调用方可通过调整请求恢复的错误。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BufferError::NegotiationFailed { .. } | BufferError::Config { .. }
        )
    }

    pub(crate) fn mismatch(flags: BufferFlags, detail: impl Into<String>) -> Self {
        BufferError::DescriptorMismatch {
            flags,
            detail: detail.into(),
        }
    }
}

/// 框架统一的返回值别名，默认错误类型为 [`BufferError`]。
pub type Result<T, E = BufferError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_failure_keeps_export_kind_in_code() {
        let unavailable = BufferError::NegotiationFailed {
            flags: BufferFlags::WRITABLE,
            source: ExportError::unavailable("read-only storage"),
        };
        let io = BufferError::NegotiationFailed {
            flags: BufferFlags::WRITABLE,
            source: ExportError::Io {
                detail: "mapping vanished".to_owned(),
            },
        };
        assert_eq!(unavailable.code(), codes::NEGOTIATION_UNAVAILABLE);
        assert_eq!(io.code(), codes::NEGOTIATION_IO);
        assert!(unavailable.is_recoverable());
        assert!(io.is_recoverable());
    }

    #[test]
    fn allocation_failure_reports_size_only_when_known() {
        let known = ExportError::Allocation {
            requested: Some(4096),
        };
        assert_eq!(known.to_string(), "exporter failed to allocate 4096 bytes");
        assert_eq!(known.code(), codes::NEGOTIATION_ALLOCATION);
        let unknown = ExportError::Allocation { requested: None };
        assert_eq!(unknown.to_string(), "exporter failed to allocate memory");
    }

    #[test]
    fn programming_errors_are_not_recoverable() {
        let err = BufferError::InvalidState {
            operation: "release",
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.code(), codes::INVALID_STATE);
        assert!(err.to_string().contains("release"));
    }
}
