//! 导出方填充的缓冲描述符（BufferDescriptor）。
//!
//! # 模块定位（Why）
//! - 描述符是协商的“应答”：导出方根据消费方的 [`BufferFlags`] 填写数据指针、长度、元素大小、格式、
//!   维度、shape/strides/suboffsets 与可写性；
//! - 未被请求的字段必须缺省，不允许导出方“猜测”填写，消费方也不应依赖它们。
//!
//! # 设计概要（How）
//! - 导出方通过 [`BufferDescriptor::fill_info`]（一维字节）或 [`DescriptorBuilder::fill`]（N 维）
//!   按标志生成描述符，这两个入口保证“只填请求的字段”；
//! - 消费方在收到描述符后调用 [`BufferDescriptor::check_against`]，
//!   在把原始区域交给别名原语之前确认导出方遵守了契约；
//! - `exporter_state` 是导出方的私有槽位（对应 `Py_buffer.internal`），释放时原样交还导出方。
//!
//! # 契约说明（What）
//! - 数据指针永远不归消费方所有；描述符本身不是 `Send`，与“单线程消费者”的资源模型一致；
//! - `format` 缺省时语义为 `"B"`（无符号字节），见 [`BufferDescriptor::format_or_default`]。

use core::any::Any;
use core::fmt;
use core::ptr::NonNull;

use crate::error::{BufferError, ExportError, Result};
use crate::flags::{BufferFlags, Contiguity};

/// 未请求格式时的隐含格式：无符号字节。
pub const DEFAULT_FORMAT: &str = "B";

/// 导出方填充的描述符。
pub struct BufferDescriptor {
    data: Option<NonNull<u8>>,
    len: usize,
    itemsize: usize,
    format: Option<String>,
    ndim: usize,
    shape: Option<Vec<isize>>,
    strides: Option<Vec<isize>>,
    suboffsets: Option<Vec<isize>>,
    readonly: bool,
    exporter_state: Option<Box<dyn Any>>,
}

impl BufferDescriptor {
    /// 零初始化的描述符：空指针、零长度、无任何可选字段。
    pub fn empty() -> Self {
        Self {
            data: None,
            len: 0,
            itemsize: 1,
            format: None,
            ndim: 1,
            shape: None,
            strides: None,
            suboffsets: None,
            readonly: true,
            exporter_state: None,
        }
    }

    /// 按标志填充一维字节描述符。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：绝大多数导出方持有的只是一段连续字节，
    ///   它们只需要这一个入口就能正确响应任意标志组合；
    /// - **契约 (What)**：
    ///   - 请求 `WRITABLE` 而 `readonly == true` 时返回 [`ExportError::Unavailable`]；
    ///   - 成功时 `itemsize == 1`、`ndim == 1`，`format`/`shape`/`strides`/`suboffsets`
    ///     仅在对应标志出现时填写；
    /// - **执行 (How)**：委托给 [`DescriptorBuilder`]，一维字节布局对任何连续性约束都成立。
    pub fn fill_info(
        data: *mut u8,
        len: usize,
        readonly: bool,
        flags: BufferFlags,
    ) -> core::result::Result<Self, ExportError> {
        DescriptorBuilder::new(data, len).readonly(readonly).fill(flags)
    }

    /// 数据起始指针；零长度描述符可能为 `None`。
    pub fn data(&self) -> Option<NonNull<u8>> {
        self.data
    }

    /// 原始指针形式，缺省时为空指针。
    pub fn data_ptr(&self) -> *mut u8 {
        self.data.map_or(core::ptr::null_mut(), NonNull::as_ptr)
    }

    /// 导出区域的总字节数。
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn itemsize(&self) -> usize {
        self.itemsize
    }

    /// 导出方声明的格式；仅在请求 `FORMAT` 时存在。
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// 缺省格式按无符号字节处理。
    pub fn format_or_default(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_FORMAT)
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    pub fn shape(&self) -> Option<&[isize]> {
        self.shape.as_deref()
    }

    pub fn strides(&self) -> Option<&[isize]> {
        self.strides.as_deref()
    }

    /// `Some(&[])` 表示“已请求间接布局，但不需要间接寻址”。
    pub fn suboffsets(&self) -> Option<&[isize]> {
        self.suboffsets.as_deref()
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    /// 是否存在实际生效的 suboffset（任一维度 `>= 0`）。
    pub fn has_indirection(&self) -> bool {
        self.suboffsets
            .as_deref()
            .is_some_and(|offsets| offsets.iter().any(|offset| *offset >= 0))
    }

    /// 写入导出方私有状态，替换已有值。
    pub fn set_exporter_state<T: Any>(&mut self, state: T) {
        self.exporter_state = Some(Box::new(state));
    }

    /// 读取导出方私有状态；类型不符时返回 `None`。
    pub fn exporter_state<T: Any>(&self) -> Option<&T> {
        self.exporter_state.as_deref()?.downcast_ref::<T>()
    }

    /// 取出导出方私有状态；类型不符时状态保持不变。
    pub fn take_exporter_state<T: Any>(&mut self) -> Option<T> {
        let boxed = self.exporter_state.take()?;
        match boxed.downcast::<T>() {
            Ok(state) => Some(*state),
            Err(other) => {
                self.exporter_state = Some(other);
                None
            }
        }
    }

    /// 计算逻辑 shape：缺省时视为 `[len / itemsize]` 的一维布局。
    pub(crate) fn logical_shape(&self) -> Vec<isize> {
        match &self.shape {
            Some(shape) => shape.clone(),
            None => {
                let items = self.len.checked_div(self.itemsize).unwrap_or(0);
                vec![items as isize]
            }
        }
    }

    /// 计算逻辑 strides：缺省时按 C 连续推导。
    pub(crate) fn logical_strides(&self) -> Vec<isize> {
        match &self.strides {
            Some(strides) => strides.clone(),
            None => contiguous_strides(&self.logical_shape(), self.itemsize, Contiguity::C),
        }
    }

    /// 判断布局是否满足给定连续性。
    ///
    /// # 契约说明（What）
    /// - 存在生效的 suboffsets 时恒为 `false`；
    /// - 未提供 strides 的描述符按定义是 C 连续；
    /// - 零长度区域对任何顺序都视为连续。
    pub fn is_contiguous(&self, order: Contiguity) -> bool {
        if self.has_indirection() {
            return false;
        }
        if self.len == 0 {
            return true;
        }
        let shape = self.logical_shape();
        let strides = self.logical_strides();
        match order {
            Contiguity::C => layout_is_contiguous(&shape, &strides, self.itemsize, Contiguity::C),
            Contiguity::Fortran => {
                layout_is_contiguous(&shape, &strides, self.itemsize, Contiguity::Fortran)
            }
            Contiguity::Any => {
                layout_is_contiguous(&shape, &strides, self.itemsize, Contiguity::C)
                    || layout_is_contiguous(&shape, &strides, self.itemsize, Contiguity::Fortran)
            }
        }
    }

    /// 校验描述符是否与请求标志一致。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：描述符来自不受本 crate 控制的导出方；在构造视图之前必须确认
    ///   “该有的字段都有、不该有的字段都没有、几何信息能覆盖声明的长度”，
    ///   否则别名原语会基于错误的长度或指针工作；
    /// - **契约 (What)**：返回 `Ok(())` 表示描述符可安全交给 [`crate::view::BufferView`]；
    ///   否则返回 [`BufferError::DescriptorMismatch`]，调用方应立即释放该描述符；
    /// - **执行 (How)**：逐项比对可写性、格式、shape、strides、suboffsets 与连续性约束。
    pub fn check_against(&self, flags: BufferFlags) -> Result<()> {
        if self.data.is_none() && self.len > 0 {
            return Err(BufferError::mismatch(flags, "null data with non-zero length"));
        }
        if self.itemsize == 0 && self.len > 0 {
            return Err(BufferError::mismatch(flags, "itemsize is zero"));
        }
        if flags.requires_writable() && self.readonly {
            return Err(BufferError::mismatch(
                flags,
                "WRITABLE requested but descriptor is read-only",
            ));
        }

        match (flags.requires_format(), &self.format) {
            (true, None) => {
                return Err(BufferError::mismatch(flags, "FORMAT requested but missing"));
            }
            (false, Some(format)) => {
                return Err(BufferError::mismatch(
                    flags,
                    format!("format `{format}` returned without FORMAT"),
                ));
            }
            _ => {}
        }

        match (flags.requires_shape(), &self.shape) {
            (true, None) => return Err(BufferError::mismatch(flags, "shape requested but missing")),
            (false, Some(_)) => {
                return Err(BufferError::mismatch(flags, "shape returned without ND"));
            }
            (true, Some(shape)) => self.check_shape(flags, shape)?,
            (false, None) => {}
        }

        match (flags.requires_strides(), &self.strides) {
            (true, None) => {
                return Err(BufferError::mismatch(flags, "strides requested but missing"));
            }
            (false, Some(_)) => {
                return Err(BufferError::mismatch(flags, "strides returned without STRIDES"));
            }
            (true, Some(strides)) if strides.len() != self.ndim => {
                return Err(BufferError::mismatch(
                    flags,
                    format!("{} strides for ndim {}", strides.len(), self.ndim),
                ));
            }
            _ => {}
        }

        match (flags.requires_suboffsets(), &self.suboffsets) {
            (false, Some(_)) => {
                return Err(BufferError::mismatch(
                    flags,
                    "suboffsets returned without INDIRECT",
                ));
            }
            (true, Some(offsets)) if !offsets.is_empty() && offsets.len() != self.ndim => {
                return Err(BufferError::mismatch(
                    flags,
                    format!("{} suboffsets for ndim {}", offsets.len(), self.ndim),
                ));
            }
            _ => {}
        }

        if let Some(order) = flags.contiguity() {
            if !self.is_contiguous(order) {
                return Err(BufferError::mismatch(
                    flags,
                    format!("layout is not {order:?}-contiguous"),
                ));
            }
        }
        Ok(())
    }

    fn check_shape(&self, flags: BufferFlags, shape: &[isize]) -> Result<()> {
        if shape.len() != self.ndim {
            return Err(BufferError::mismatch(
                flags,
                format!("{} shape entries for ndim {}", shape.len(), self.ndim),
            ));
        }
        let covered = shape_bytes(shape, self.itemsize)
            .ok_or_else(|| BufferError::mismatch(flags, "shape has negative or overflowing extents"))?;
        if covered != self.len {
            return Err(BufferError::mismatch(
                flags,
                format!("shape covers {covered} bytes but len is {}", self.len),
            ));
        }
        Ok(())
    }
}

impl Default for BufferDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for BufferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferDescriptor")
            .field("data", &self.data)
            .field("len", &self.len)
            .field("itemsize", &self.itemsize)
            .field("format", &self.format)
            .field("ndim", &self.ndim)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("suboffsets", &self.suboffsets)
            .field("readonly", &self.readonly)
            .field("exporter_state", &self.exporter_state.is_some())
            .finish()
    }
}

/// `product(shape) * itemsize`；出现负维度或溢出时返回 `None`。
pub(crate) fn shape_bytes(shape: &[isize], itemsize: usize) -> Option<usize> {
    shape.iter().try_fold(itemsize, |acc, dim| {
        let dim = usize::try_from(*dim).ok()?;
        acc.checked_mul(dim)
    })
}

/// 按给定顺序计算连续布局的 strides。
///
/// C 顺序最后一维步长为 `itemsize`；Fortran 顺序第一维步长为 `itemsize`。
/// `Contiguity::Any` 按 C 顺序处理。
pub fn contiguous_strides(shape: &[isize], itemsize: usize, order: Contiguity) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut step = itemsize as isize;
    match order {
        Contiguity::Fortran => {
            for (stride, dim) in strides.iter_mut().zip(shape) {
                *stride = step;
                step = step.saturating_mul((*dim).max(1));
            }
        }
        Contiguity::C | Contiguity::Any => {
            for (stride, dim) in strides.iter_mut().zip(shape).rev() {
                *stride = step;
                step = step.saturating_mul((*dim).max(1));
            }
        }
    }
    strides
}

/// 忽略长度为 1 的维度，逐维比较实际步长与连续布局步长。
fn layout_is_contiguous(
    shape: &[isize],
    strides: &[isize],
    itemsize: usize,
    order: Contiguity,
) -> bool {
    if shape.iter().any(|dim| *dim == 0) {
        return true;
    }
    let mut expected = itemsize as isize;
    let mut check = |dim: isize, stride: isize| {
        if dim > 1 && stride != expected {
            return false;
        }
        expected = expected.saturating_mul(dim);
        true
    };
    match order {
        Contiguity::Fortran => shape
            .iter()
            .zip(strides)
            .all(|(dim, stride)| check(*dim, *stride)),
        Contiguity::C | Contiguity::Any => shape
            .iter()
            .zip(strides)
            .rev()
            .all(|(dim, stride)| check(*dim, *stride)),
    }
}

/// 导出方构造描述符的辅助器。
///
/// # 教案式说明
/// - **意图 (Why)**：导出方掌握的是“真实布局”（指针、长度、元素大小、shape、存储顺序），
///   而应答内容取决于消费方请求的标志；把“按标志裁剪字段并拒绝无法满足的请求”集中在一处，
///   避免每个导出方各自实现而出现字段猜测；
/// - **契约 (What)**：[`fill`](Self::fill) 只填请求的字段并对无法满足的请求返回
///   [`ExportError::Unavailable`]；[`build_unchecked`](Self::build_unchecked) 原样输出全部字段，
///   供 FFI 适配与测试替身模拟任意（包括不合规的）导出方；
/// - **执行 (How)**：先确定真实 strides（显式给定或按顺序推导），再依次检查可写性、
///   间接寻址、连续性，最后裁剪字段。
#[derive(Clone, Debug)]
pub struct DescriptorBuilder {
    data: *mut u8,
    len: usize,
    itemsize: usize,
    format: String,
    shape: Option<Vec<isize>>,
    order: Contiguity,
    strides: Option<Vec<isize>>,
    suboffsets: Option<Vec<isize>>,
    readonly: bool,
}

impl DescriptorBuilder {
    /// 以一维可写字节布局起步。
    pub fn new(data: *mut u8, len: usize) -> Self {
        Self {
            data,
            len,
            itemsize: 1,
            format: DEFAULT_FORMAT.to_owned(),
            shape: None,
            order: Contiguity::C,
            strides: None,
            suboffsets: None,
            readonly: false,
        }
    }

    pub fn itemsize(mut self, itemsize: usize) -> Self {
        self.itemsize = itemsize;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn shape(mut self, shape: Vec<isize>) -> Self {
        self.shape = Some(shape);
        self
    }

    /// 存储顺序；仅在未显式给出 strides 时用于推导步长。
    pub fn order(mut self, order: Contiguity) -> Self {
        self.order = order;
        self
    }

    /// 显式的非连续布局。
    pub fn strides(mut self, strides: Vec<isize>) -> Self {
        self.strides = Some(strides);
        self
    }

    pub fn suboffsets(mut self, suboffsets: Vec<isize>) -> Self {
        self.suboffsets = Some(suboffsets);
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    fn resolved_shape(&self) -> Vec<isize> {
        self.shape.clone().unwrap_or_else(|| {
            let items = self.len.checked_div(self.itemsize).unwrap_or(0);
            vec![items as isize]
        })
    }

    fn resolved_strides(&self, shape: &[isize]) -> Vec<isize> {
        self.strides
            .clone()
            .unwrap_or_else(|| contiguous_strides(shape, self.itemsize, self.order))
    }

    /// 按标志生成描述符。
    ///
    /// # Errors
    /// - 只读布局上请求 `WRITABLE`；
    /// - 布局含间接寻址而未请求 `INDIRECT`；
    /// - 未请求 strides 而布局不是 C 连续（此时消费方会按 C 连续解读数据）；
    /// - 请求的连续性与真实布局不符；
    /// - shape 与长度不一致。
    pub fn fill(self, flags: BufferFlags) -> core::result::Result<BufferDescriptor, ExportError> {
        if flags.requires_writable() && self.readonly {
            return Err(ExportError::unavailable("object is not writable"));
        }
        let shape = self.resolved_shape();
        match shape_bytes(&shape, self.itemsize) {
            Some(bytes) if bytes == self.len => {}
            _ => {
                return Err(ExportError::unavailable(
                    "layout shape does not cover the exported length",
                ));
            }
        }
        let strides = self.resolved_strides(&shape);
        let indirect = self
            .suboffsets
            .as_deref()
            .is_some_and(|offsets| offsets.iter().any(|offset| *offset >= 0));
        if indirect && !flags.requires_suboffsets() {
            return Err(ExportError::unavailable(
                "layout uses suboffsets but INDIRECT was not requested",
            ));
        }
        let empty = self.len == 0;
        let c_contiguous =
            !indirect && (empty || layout_is_contiguous(&shape, &strides, self.itemsize, Contiguity::C));
        let f_contiguous = !indirect
            && (empty || layout_is_contiguous(&shape, &strides, self.itemsize, Contiguity::Fortran));
        if !flags.requires_strides() && !c_contiguous {
            return Err(ExportError::unavailable("layout is not C-contiguous"));
        }
        match flags.contiguity() {
            Some(Contiguity::C) if !c_contiguous => {
                return Err(ExportError::unavailable("layout is not C-contiguous"));
            }
            Some(Contiguity::Fortran) if !f_contiguous => {
                return Err(ExportError::unavailable("layout is not Fortran-contiguous"));
            }
            Some(Contiguity::Any) if !c_contiguous && !f_contiguous => {
                return Err(ExportError::unavailable("layout is not contiguous"));
            }
            _ => {}
        }

        let ndim = shape.len();
        Ok(BufferDescriptor {
            data: NonNull::new(self.data),
            len: self.len,
            itemsize: self.itemsize,
            format: flags.requires_format().then_some(self.format),
            ndim,
            shape: flags.requires_shape().then_some(shape),
            strides: flags.requires_strides().then_some(strides),
            suboffsets: flags
                .requires_suboffsets()
                .then(|| if indirect { self.suboffsets.unwrap_or_default() } else { Vec::new() }),
            readonly: self.readonly,
            exporter_state: None,
        })
    }

    /// 原样输出所有字段，不做任何按标志的裁剪或校验。
    pub fn build_unchecked(self) -> BufferDescriptor {
        let shape = self.resolved_shape();
        let ndim = shape.len();
        BufferDescriptor {
            data: NonNull::new(self.data),
            len: self.len,
            itemsize: self.itemsize,
            format: Some(self.format.clone()),
            ndim,
            strides: self.strides.clone(),
            shape: Some(shape),
            suboffsets: self.suboffsets,
            readonly: self.readonly,
            exporter_state: None,
        }
    }
}

/// 供 FFI 适配层直接组装描述符。
pub(crate) struct RawParts {
    pub data: *mut u8,
    pub len: usize,
    pub itemsize: usize,
    pub format: Option<String>,
    pub ndim: usize,
    pub shape: Option<Vec<isize>>,
    pub strides: Option<Vec<isize>>,
    pub suboffsets: Option<Vec<isize>>,
    pub readonly: bool,
}

impl From<RawParts> for BufferDescriptor {
    fn from(parts: RawParts) -> Self {
        Self {
            data: NonNull::new(parts.data),
            len: parts.len,
            itemsize: parts.itemsize,
            format: parts.format,
            ndim: parts.ndim,
            shape: parts.shape,
            strides: parts.strides,
            suboffsets: parts.suboffsets,
            readonly: parts.readonly,
            exporter_state: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_request_leaves_optional_fields_unset() {
        let mut storage = [1u8, 2, 3];
        let descriptor =
            BufferDescriptor::fill_info(storage.as_mut_ptr(), 3, false, BufferFlags::SIMPLE).unwrap();
        assert_eq!(descriptor.format(), None);
        assert_eq!(descriptor.format_or_default(), "B");
        assert!(descriptor.shape().is_none());
        assert!(descriptor.strides().is_none());
        assert!(descriptor.suboffsets().is_none());
        assert!(descriptor.check_against(BufferFlags::SIMPLE).is_ok());
    }

    #[test]
    fn writable_request_on_readonly_layout_is_unavailable() {
        let mut storage = [0u8; 4];
        let err = BufferDescriptor::fill_info(storage.as_mut_ptr(), 4, true, BufferFlags::CONTIG)
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn full_request_fills_every_field() {
        let mut storage = [0u8; 6];
        let descriptor = DescriptorBuilder::new(storage.as_mut_ptr(), 6)
            .itemsize(2)
            .format("H")
            .shape(vec![3])
            .fill(BufferFlags::FULL)
            .unwrap();
        assert_eq!(descriptor.format(), Some("H"));
        assert_eq!(descriptor.shape(), Some(&[3][..]));
        assert_eq!(descriptor.strides(), Some(&[2][..]));
        assert_eq!(descriptor.suboffsets(), Some(&[][..]));
        assert!(!descriptor.has_indirection());
        assert!(descriptor.check_against(BufferFlags::FULL).is_ok());
    }

    #[test]
    fn fortran_layout_refuses_c_contiguity_and_nd() {
        let mut storage = [0u8; 6];
        let builder = DescriptorBuilder::new(storage.as_mut_ptr(), 6)
            .shape(vec![2, 3])
            .order(Contiguity::Fortran);
        assert!(builder.clone().fill(BufferFlags::C_CONTIGUOUS).is_err());
        assert!(builder.clone().fill(BufferFlags::ND).is_err());
        let descriptor = builder.fill(BufferFlags::F_CONTIGUOUS).unwrap();
        assert_eq!(descriptor.strides(), Some(&[1, 2][..]));
        assert!(descriptor.is_contiguous(Contiguity::Fortran));
        assert!(!descriptor.is_contiguous(Contiguity::C));
        assert!(descriptor.is_contiguous(Contiguity::Any));
    }

    #[test]
    fn contiguous_strides_follow_order() {
        assert_eq!(contiguous_strides(&[2, 3, 4], 8, Contiguity::C), vec![96, 32, 8]);
        assert_eq!(
            contiguous_strides(&[2, 3, 4], 8, Contiguity::Fortran),
            vec![8, 16, 48]
        );
    }

    #[test]
    fn check_rejects_unrequested_fields() {
        let mut storage = [0u8; 4];
        let descriptor = DescriptorBuilder::new(storage.as_mut_ptr(), 4).build_unchecked();
        let err = descriptor.check_against(BufferFlags::SIMPLE).unwrap_err();
        assert!(matches!(err, BufferError::DescriptorMismatch { .. }));
    }

    #[test]
    fn check_rejects_shape_that_does_not_cover_len() {
        let mut storage = [0u8; 4];
        let descriptor = DescriptorBuilder::new(storage.as_mut_ptr(), 4)
            .shape(vec![4])
            .fill(BufferFlags::ND)
            .unwrap();
        assert!(descriptor.check_against(BufferFlags::ND).is_ok());

        let lying = BufferDescriptor::from(RawParts {
            data: storage.as_mut_ptr(),
            len: 4,
            itemsize: 1,
            format: None,
            ndim: 1,
            shape: Some(vec![8]),
            strides: None,
            suboffsets: None,
            readonly: false,
        });
        assert!(lying.check_against(BufferFlags::ND).is_err());
    }

    #[test]
    fn exporter_state_round_trips_by_type() {
        let mut descriptor = BufferDescriptor::empty();
        descriptor.set_exporter_state(7u32);
        assert_eq!(descriptor.exporter_state::<u32>(), Some(&7));
        assert_eq!(descriptor.take_exporter_state::<u64>(), None);
        assert_eq!(descriptor.take_exporter_state::<u32>(), Some(7));
        assert_eq!(descriptor.exporter_state::<u32>(), None);
    }
}
