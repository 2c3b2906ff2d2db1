//! ### English
//! Error taxonomy shared by every queue, buffer and allocator operation.
//!
//! Each family has a stable numeric band (`SurfaceError::code`). Allocator failures keep the
//! backend's class as an offset inside the `ApiFailed` band so the failing layer stays visible.
//!
//! ### 中文
//! 队列、缓冲区与分配器操作共享的错误分类。
//!
//! 每个错误族都有稳定的数值区段（`SurfaceError::code`）。分配器失败会在 `ApiFailed`
//! 区段内保留后端的错误类别偏移，以便区分出错的层级。

use thiserror::Error;

/// ### English
/// Base of the numeric band for each error family.
///
/// ### 中文
/// 各错误族数值区段的基数。
const BAND_INVALID_ARGUMENTS: i32 = 40_001_000;
const BAND_INVALID_PARAM: i32 = 40_002_000;
const BAND_NO_ENTRY: i32 = 40_003_000;
const BAND_INVALID_OPERATING: i32 = 40_004_000;
const BAND_NO_CONSUMER: i32 = 41_001_000;
const BAND_NO_BUFFER: i32 = 41_002_000;
const BAND_NOT_SUPPORT: i32 = 50_001_000;
const BAND_API_FAILED: i32 = 50_002_000;
const BAND_NOT_INIT: i32 = 50_003_000;
const BAND_INTERNAL: i32 = 50_004_000;

/// ### English
/// Offset used when the backend failed without a more specific class.
///
/// ### 中文
/// 后端失败但无更具体类别时使用的偏移。
const LOWERROR_FAILURE: i32 = 500;
const LOWERROR_INVALID: i32 = 999;

/// ### English
/// Failure class reported by the buffer allocator backend.
///
/// ### 中文
/// 缓冲区分配器后端报告的失败类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum LowError {
    #[error("allocator failure")]
    Failure,
    #[error("bad descriptor")]
    BadFd,
    #[error("invalid allocator parameter")]
    InvalidParam,
    #[error("null pointer from allocator")]
    NullPtr,
    #[error("allocator does not support the request")]
    NotSupported,
    #[error("allocator out of memory")]
    NoMem,
    #[error("allocator busy")]
    Busy,
    #[error("allocator permission denied")]
    NotPermitted,
    #[error("unrecognized allocator status")]
    Unknown,
}

impl LowError {
    /// ### English
    /// Errno-style offset added to the `ApiFailed` band.
    ///
    /// ### 中文
    /// 叠加在 `ApiFailed` 区段上的 errno 风格偏移。
    pub const fn offset(self) -> i32 {
        match self {
            LowError::Failure => LOWERROR_FAILURE,
            LowError::BadFd => 9,
            LowError::InvalidParam | LowError::NullPtr => 22,
            LowError::NotSupported => 95,
            LowError::NoMem => 12,
            LowError::Busy => 16,
            LowError::NotPermitted => 1,
            LowError::Unknown => LOWERROR_INVALID,
        }
    }
}

/// ### English
/// Error returned by surface operations.
///
/// `NoBuffer` and `NoConsumer` are transient and may be retried; the rest are either
/// programming errors or backend failures.
///
/// ### 中文
/// surface 操作返回的错误。
///
/// `NoBuffer` 与 `NoConsumer` 为瞬时错误，可重试；其余为编程错误或后端失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum SurfaceError {
    #[error("invalid arguments")]
    InvalidArguments,
    #[error("no consumer registered")]
    NoConsumer,
    #[error("no buffer available")]
    NoBuffer,
    #[error("invalid parameter")]
    InvalidParam,
    #[error("operation invalid in the current buffer state")]
    InvalidOperating,
    #[error("operation not supported for this role")]
    NotSupport,
    #[error("no such entry")]
    NoEntry,
    #[error("allocator call failed: {0}")]
    ApiFailed(LowError),
    #[error("allocator not initialized")]
    NotInit,
    #[error("internal error")]
    Internal,
}

impl SurfaceError {
    /// ### English
    /// Stable numeric code of this error (family band plus backend offset).
    ///
    /// ### 中文
    /// 此错误的稳定数值码（错误族区段加后端偏移）。
    pub const fn code(self) -> i32 {
        match self {
            SurfaceError::InvalidArguments => BAND_INVALID_ARGUMENTS,
            SurfaceError::InvalidParam => BAND_INVALID_PARAM,
            SurfaceError::NoEntry => BAND_NO_ENTRY,
            SurfaceError::InvalidOperating => BAND_INVALID_OPERATING,
            SurfaceError::NoConsumer => BAND_NO_CONSUMER,
            SurfaceError::NoBuffer => BAND_NO_BUFFER,
            SurfaceError::NotSupport => BAND_NOT_SUPPORT,
            SurfaceError::ApiFailed(low) => BAND_API_FAILED + low.offset(),
            SurfaceError::NotInit => BAND_NOT_INIT,
            SurfaceError::Internal => BAND_INTERNAL,
        }
    }

    /// ### English
    /// Whether the caller may simply retry later.
    ///
    /// ### 中文
    /// 调用方是否可以稍后直接重试。
    pub const fn is_transient(self) -> bool {
        matches!(self, SurfaceError::NoBuffer | SurfaceError::NoConsumer)
    }
}

pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// ### English
/// A failed token-consuming call: the error plus the token handed back to the caller.
///
/// ### 中文
/// 失败的令牌消费调用：错误以及交还给调用方的令牌。
#[derive(Debug)]
pub struct Rejected<T> {
    error: SurfaceError,
    token: T,
}

impl<T> Rejected<T> {
    pub(crate) fn new(error: SurfaceError, token: T) -> Self {
        Self { error, token }
    }

    pub fn error(&self) -> SurfaceError {
        self.error
    }

    /// ### English
    /// Takes the token back so the call can be retried.
    ///
    /// ### 中文
    /// 取回令牌以便重试调用。
    pub fn into_inner(self) -> T {
        self.token
    }

    pub fn into_parts(self) -> (SurfaceError, T) {
        (self.error, self.token)
    }
}

impl<T: std::fmt::Debug> std::fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<T: std::fmt::Debug> std::error::Error for Rejected<T> {}

impl<T> From<Rejected<T>> for SurfaceError {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_are_distinguishable() {
        let all = [
            SurfaceError::InvalidArguments,
            SurfaceError::NoConsumer,
            SurfaceError::NoBuffer,
            SurfaceError::InvalidParam,
            SurfaceError::InvalidOperating,
            SurfaceError::NotSupport,
            SurfaceError::NoEntry,
            SurfaceError::ApiFailed(LowError::Failure),
            SurfaceError::NotInit,
            SurfaceError::Internal,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.code(), b.code(), "{a:?} and {b:?} share a code");
            }
        }
    }

    #[test]
    fn api_failed_keeps_backend_class() {
        let no_mem = SurfaceError::ApiFailed(LowError::NoMem).code();
        let busy = SurfaceError::ApiFailed(LowError::Busy).code();
        assert_ne!(no_mem, busy);
        assert_eq!(no_mem / 1000, busy / 1000);
        assert_eq!(no_mem - BAND_API_FAILED, 12);
    }

    #[test]
    fn only_exhaustion_is_transient() {
        assert!(SurfaceError::NoBuffer.is_transient());
        assert!(SurfaceError::NoConsumer.is_transient());
        assert!(!SurfaceError::InvalidOperating.is_transient());
    }
}
