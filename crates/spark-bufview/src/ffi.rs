//! C ABI 导出方适配。
//!
//! # 模块定位（Why）
//! - 许多导出方生活在 C 世界：它们按 `Py_buffer` 的布局填写一条记录并返回整数状态码；
//! - 本模块把“上下文指针 + 填充函数 + 释放函数”适配为 [`BufferExporter`]，
//!   使这些导出方与 Rust 导出方走同一条协商、校验、释放路径。
//!
//! # 结构设计（How）
//! - [`RawBufferDescriptor`] 与 `Py_buffer` 字段顺序、类型逐一对应；
//! - 填充成功后只读取元数据（格式串、shape、strides、suboffsets），数据字节从不被读取或复制；
//!   元数据数组通过 [`crate::alias::slice_at`] 访问后复制进 [`BufferDescriptor`]；
//! - 原始记录以 `Box` 固定地址保存在描述符的 `exporter_state` 中，释放时原样交还导出方，
//!   导出方可以继续使用它在 `internal`/`obj` 中存放的私有数据。
//!
//! # 契约说明（What）
//! - 状态码：`0` 成功，`-1` 不可用，`-2` I/O 失败，`-3` 内存不足；其余非零值按“不可用”处理；
//! - 填充成功但记录无法解读（负长度、非 UTF-8 格式串、未对齐的元数据数组）时，
//!   记录会被立即交还导出方，协商以 [`ExportError::Malformed`] 失败。

use core::ffi::{CStr, c_char, c_int, c_void};
use core::fmt;
use core::ptr;

use crate::alias;
use crate::descriptor::{BufferDescriptor, RawParts};
use crate::error::ExportError;
use crate::exporter::BufferExporter;
use crate::flags::BufferFlags;

/// 填充结果状态码。
pub mod status {
    use core::ffi::c_int;

    pub const OK: c_int = 0;
    pub const UNAVAILABLE: c_int = -1;
    pub const IO: c_int = -2;
    pub const NO_MEMORY: c_int = -3;
}

/// 与 CPython `Py_buffer` 布局一致的原始描述符。
#[repr(C)]
#[derive(Debug)]
pub struct RawBufferDescriptor {
    pub buf: *mut c_void,
    pub obj: *mut c_void,
    pub len: isize,
    pub itemsize: isize,
    pub readonly: c_int,
    pub ndim: c_int,
    pub format: *mut c_char,
    pub shape: *mut isize,
    pub strides: *mut isize,
    pub suboffsets: *mut isize,
    pub internal: *mut c_void,
}

impl RawBufferDescriptor {
    /// 全零记录，交给导出方填充前的初始状态。
    pub const fn zeroed() -> Self {
        Self {
            buf: ptr::null_mut(),
            obj: ptr::null_mut(),
            len: 0,
            itemsize: 0,
            readonly: 0,
            ndim: 0,
            format: ptr::null_mut(),
            shape: ptr::null_mut(),
            strides: ptr::null_mut(),
            suboffsets: ptr::null_mut(),
            internal: ptr::null_mut(),
        }
    }
}

impl Default for RawBufferDescriptor {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// 按标志填充记录，返回 [`status`] 中的状态码。
pub type FillFn =
    unsafe extern "C" fn(ctx: *mut c_void, view: *mut RawBufferDescriptor, flags: c_int) -> c_int;

/// 归还一条此前填充成功的记录。
pub type ReleaseFn = unsafe extern "C" fn(ctx: *mut c_void, view: *mut RawBufferDescriptor);

/// 保存在描述符中的原始记录。
struct ForeignRecord(Box<RawBufferDescriptor>);

/// C ABI 导出方。
pub struct ForeignExporter {
    ctx: *mut c_void,
    fill: FillFn,
    release: ReleaseFn,
}

impl ForeignExporter {
    /// 以上下文指针与一对 C 入口构造导出方。
    ///
    /// # Safety
    /// - `ctx` 在导出方及其全部未归还描述符的生命周期内有效；
    /// - `fill` 返回 [`status::OK`] 时写入的记录满足 [`BufferExporter`] 的全部保证：
    ///   `[buf, buf + len)` 在对应的 `release` 调用之前有效且不移动，`readonly == 0` 时独占；
    ///   `format` 为空或指向以 NUL 结尾的字符串，`shape`/`strides`/`suboffsets` 为空或指向 `ndim` 个元素；
    /// - `fill` 返回非零时不要求 `release`；
    /// - `release` 接受 `fill` 成功填充的记录，且每条记录恰好被调用一次。
    pub unsafe fn new(ctx: *mut c_void, fill: FillFn, release: ReleaseFn) -> Self {
        Self { ctx, fill, release }
    }

    pub fn context(&self) -> *mut c_void {
        self.ctx
    }

    fn give_back(&self, raw: &mut RawBufferDescriptor) {
        // SAFETY: `raw` 来自一次成功的 `fill`，构造契约保证 `release` 可以接受它。
        unsafe { (self.release)(self.ctx, raw) }
    }
}

impl fmt::Debug for ForeignExporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignExporter")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

fn status_error(code: c_int) -> ExportError {
    match code {
        status::IO => ExportError::Io {
            detail: "foreign exporter reported an i/o failure".to_owned(),
        },
        status::NO_MEMORY => ExportError::Allocation { requested: None },
        status::UNAVAILABLE => ExportError::unavailable("foreign exporter refused the request"),
        other => ExportError::unavailable(format!("foreign exporter returned status {other}")),
    }
}

fn malformed(detail: impl Into<String>) -> ExportError {
    ExportError::Malformed {
        detail: detail.into(),
    }
}

/// 复制一个可空的元数据数组。
///
/// # Safety
/// `values` 为空或指向至少 `ndim` 个已初始化的 `isize`。
unsafe fn copy_dims(values: *const isize, ndim: usize, field: &str) -> Result<Option<Vec<isize>>, ExportError> {
    if values.is_null() {
        return Ok(None);
    }
    // SAFETY: 由调用方保证。
    let dims = unsafe { alias::slice_at(values, ndim) }
        .map_err(|err| malformed(format!("{field}: {err}")))?;
    Ok(Some(dims.to_vec()))
}

/// 解读导出方填写的记录。
///
/// # Safety
/// 记录来自一次成功的填充，满足 [`ForeignExporter::new`] 中的记录约束。
unsafe fn parts_from_raw(raw: &RawBufferDescriptor) -> Result<RawParts, ExportError> {
    let len = usize::try_from(raw.len).map_err(|_| malformed(format!("negative len {}", raw.len)))?;
    let itemsize = usize::try_from(raw.itemsize)
        .map_err(|_| malformed(format!("negative itemsize {}", raw.itemsize)))?;
    let ndim = usize::try_from(raw.ndim).map_err(|_| malformed(format!("negative ndim {}", raw.ndim)))?;
    let format = if raw.format.is_null() {
        None
    } else {
        // SAFETY: 非空格式串以 NUL 结尾，由调用方保证。
        let text = unsafe { CStr::from_ptr(raw.format) };
        let text = text
            .to_str()
            .map_err(|err| malformed(format!("format is not utf-8: {err}")))?;
        Some(text.to_owned())
    };
    // SAFETY: 三个数组均为空或含 `ndim` 个元素，由调用方保证。
    let (shape, strides, suboffsets) = unsafe {
        (
            copy_dims(raw.shape, ndim, "shape")?,
            copy_dims(raw.strides, ndim, "strides")?,
            copy_dims(raw.suboffsets, ndim, "suboffsets")?,
        )
    };
    Ok(RawParts {
        data: raw.buf.cast::<u8>(),
        len,
        itemsize,
        format,
        ndim,
        shape,
        strides,
        suboffsets,
        readonly: raw.readonly != 0,
    })
}

// SAFETY: 区域有效性与独占性由 `ForeignExporter::new` 的调用方保证。
unsafe impl BufferExporter for ForeignExporter {
    fn fill_descriptor(&self, flags: BufferFlags) -> Result<BufferDescriptor, ExportError> {
        let mut raw = Box::new(RawBufferDescriptor::zeroed());
        // SAFETY: `raw` 是有效的可写记录；`fill` 的行为由构造契约约束。
        let code = unsafe { (self.fill)(self.ctx, &mut *raw, flags.bits()) };
        if code != status::OK {
            tracing::debug!(%flags, code, "foreign exporter refused buffer request");
            return Err(status_error(code));
        }

        // SAFETY: 记录刚由成功的 `fill` 写入。
        match unsafe { parts_from_raw(&raw) } {
            Ok(parts) => {
                let mut descriptor = BufferDescriptor::from(parts);
                descriptor.set_exporter_state(ForeignRecord(raw));
                Ok(descriptor)
            }
            Err(err) => {
                tracing::warn!(%flags, error = %err, "foreign exporter wrote an unreadable record; releasing");
                self.give_back(&mut raw);
                Err(err)
            }
        }
    }

    fn release_descriptor(&self, descriptor: &mut BufferDescriptor) {
        match descriptor.take_exporter_state::<ForeignRecord>() {
            Some(ForeignRecord(mut raw)) => self.give_back(&mut raw),
            None => tracing::warn!("descriptor carries no foreign record; release skipped"),
        }
    }
}
