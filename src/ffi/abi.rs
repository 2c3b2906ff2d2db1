#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version.
///
/// ### 中文
/// 返回 C ABI 版本号。
pub extern "C" fn surface_queue_abi_version() -> u32 {
    super::SURFACE_QUEUE_ABI_VERSION
}

#[unsafe(no_mangle)]
/// ### English
/// Returns `1` when `code` is a transient status (`NoBuffer`, `NoConsumer`) worth retrying.
///
/// ### 中文
/// 当 `code` 属于可重试的瞬时状态（`NoBuffer`、`NoConsumer`）时返回 `1`。
pub extern "C" fn surface_queue_status_is_transient(code: i32) -> u8 {
    use crate::surface::error::SurfaceError;

    (code == SurfaceError::NoBuffer.code() || code == SurfaceError::NoConsumer.code()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::error::SurfaceError;

    #[test]
    fn transient_codes() {
        assert_eq!(surface_queue_abi_version(), 1);
        assert_eq!(surface_queue_status_is_transient(SurfaceError::NoBuffer.code()), 1);
        assert_eq!(surface_queue_status_is_transient(SurfaceError::InvalidParam.code()), 0);
        assert_eq!(surface_queue_status_is_transient(0), 0);
    }
}
