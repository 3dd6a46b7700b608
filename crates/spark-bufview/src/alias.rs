//! 零拷贝别名原语（ViewAliasing 的核心）。
//!
//! # 模块定位（Why）
//! - 导出方交给消费方的只是一段 `(指针, 元素数)`，长度在运行期才知道；
//!   消费方需要把它当作普通切片使用，同时保证不复制、不分配、不越界；
//! - 这一转换只在本模块出现一次，其余代码全部通过 [`slice_at`] / [`slice_at_mut`] 获得视图，
//!   `unsafe` 因而集中在一个可被充分测试的小函数里。
//!
//! # 设计概要（How）
//! - 原语只以元素类型 `T` 为参数，长度是运行期值；不存在“每种长度一个类型”的膨胀；
//! - [`max_len`] 给出 `T` 在地址空间内可表示的最大元素数（`isize::MAX / size_of::<T>()`），
//!   相当于“按元素类型定义一次的超大区域”，任何请求长度都先与它比较，再截取恰好 `n` 个元素；
//! - 空指针且 `n == 0` 时直接返回规范空切片，完全不触碰该指针。
//!
//! # 契约说明（What）
//! - 返回切片的长度恒等于 `n`；读写永远落在 `[ptr, ptr + n * size_of::<T>())` 之内；
//! - 生命周期 `'a` 由调用方选择，调用方负责保证区域在 `'a` 内有效，
//!   在本 crate 中它被绑定到 [`crate::lease::Lease`] 的借用上。

use core::mem::{align_of, size_of};
use core::ptr::NonNull;
use core::slice;

use thiserror::Error;

/// 原始区域无法构成合法切片的原因。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum AliasError {
    /// 空指针却声明了非零长度。
    #[error("null data pointer with non-zero length {len}")]
    Null { len: usize },

    /// 指针未按元素类型对齐。
    #[error("pointer {addr:#x} is not aligned to {align} bytes")]
    Misaligned { addr: usize, align: usize },

    /// 长度超过元素类型在地址空间内可表示的上限。
    #[error("length {len} exceeds the addressable maximum of {max} elements")]
    TooLong { len: usize, max: usize },
}

/// `T` 类型切片的最大元素数。
///
/// 切片的字节长度不得超过 `isize::MAX`；零尺寸类型不占地址空间，上限为 `usize::MAX`。
pub const fn max_len<T>() -> usize {
    let size = size_of::<T>();
    if size == 0 {
        usize::MAX
    } else {
        isize::MAX as usize / size
    }
}

/// 在 `ptr == null && n == 0` 之外的情形下校验区域，返回非空指针。
fn check_region<T>(ptr: *const T, n: usize) -> Result<Option<NonNull<T>>, AliasError> {
    let Some(non_null) = NonNull::new(ptr.cast_mut()) else {
        if n == 0 {
            return Ok(None);
        }
        return Err(AliasError::Null { len: n });
    };
    let addr = non_null.as_ptr() as usize;
    if addr % align_of::<T>() != 0 {
        return Err(AliasError::Misaligned {
            addr,
            align: align_of::<T>(),
        });
    }
    let max = max_len::<T>();
    if n > max {
        return Err(AliasError::TooLong { len: n, max });
    }
    Ok(Some(non_null))
}

/// 把 `(ptr, n)` 视作恰好 `n` 个 `T` 的只读切片。
///
/// # Safety
/// - 若 `ptr` 非空，则 `[ptr, ptr + n)` 必须在整个 `'a` 内指向同一次分配中已初始化的 `T`；
/// - 在 `'a` 内不得有其它可变引用修改该区域。
///
/// # Errors
/// - 空指针且 `n > 0`、指针未对齐、`n` 超过 [`max_len`] 时返回 [`AliasError`]。
pub unsafe fn slice_at<'a, T>(ptr: *const T, n: usize) -> Result<&'a [T], AliasError> {
    match check_region(ptr, n)? {
        None => Ok(&[]),
        // SAFETY: 非空、已对齐、长度不超过 isize::MAX 字节均已检查；
        // 区域有效性与别名约束由调用方按本函数契约保证。
        Some(start) => Ok(unsafe { slice::from_raw_parts(start.as_ptr(), n) }),
    }
}

/// 把 `(ptr, n)` 视作恰好 `n` 个 `T` 的可变切片。
///
/// # Safety
/// - 同 [`slice_at`]，且在整个 `'a` 内该区域不得被任何其它引用读写。
///
/// # Errors
/// - 同 [`slice_at`]。
pub unsafe fn slice_at_mut<'a, T>(ptr: *mut T, n: usize) -> Result<&'a mut [T], AliasError> {
    match check_region(ptr, n)? {
        None => Ok(&mut []),
        // SAFETY: 同 `slice_at`；独占性由调用方保证。
        Some(start) => Ok(unsafe { slice::from_raw_parts_mut(start.as_ptr(), n) }),
    }
}
