//! 消费方视图：在租约之上提供字节、类型化与 N 维逐项访问。
//!
//! # 模块定位（Why）
//! - [`BufferView`] 是协商成功后消费方唯一拿到的句柄，内部持有 [`Lease`]；
//!   所有对导出内存的访问都经由 [`crate::alias`] 的原语完成，不复制、不越界；
//! - 仅 [`BufferView::copy_to_vec`] 会复制数据，它是协商之后的显式操作。
//!
//! # 契约说明（What）
//! - 访问数据（字节、类型化切片、逐项访问、复制）在释放后返回 [`BufferError::InvalidState`]；
//! - 元数据访问器（长度、维度、格式等）在释放后仍可读取，它们不触碰导出内存；
//! - 视图不是 `Clone` 也不是 `Send`。

use core::fmt;
use core::mem::size_of;

use crate::alias;
use crate::descriptor::BufferDescriptor;
use crate::element::{Element, format_matches};
use crate::error::{BufferError, Result};
use crate::exporter::BufferExporter;
use crate::flags::{BufferFlags, Contiguity};
use crate::lease::{Lease, LeaseState};

/// 一次成功协商得到的零拷贝视图。
pub struct BufferView<'e, E: BufferExporter + ?Sized> {
    lease: Lease<'e, E>,
}

impl<'e, E: BufferExporter + ?Sized> BufferView<'e, E> {
    pub(crate) fn new(lease: Lease<'e, E>) -> Self {
        Self { lease }
    }

    /// 以字节切片访问整个导出区域，长度等于描述符 `len`。
    ///
    /// # Errors
    /// - 已释放：[`BufferError::InvalidState`]；
    /// - 描述符为空指针却声明了长度：[`BufferError::Alias`]。
    pub fn as_bytes(&self) -> Result<&[u8]> {
        self.lease.ensure_borrowed("as_bytes")?;
        let descriptor = self.lease.metadata();
        // SAFETY: 租约处于借用阶段，导出方保证 `[data, data + len)` 有效且在此期间不被修改或移动；
        // 返回切片的生命周期绑定在 `&self` 上，不会越过释放。
        let bytes = unsafe { alias::slice_at(descriptor.data_ptr().cast_const(), descriptor.len()) }?;
        Ok(bytes)
    }

    /// 以可变字节切片访问整个导出区域。
    ///
    /// # Errors
    /// 在 [`as_bytes`](Self::as_bytes) 的基础上，只读描述符返回 [`BufferError::ReadOnly`]。
    pub fn as_bytes_mut(&mut self) -> Result<&mut [u8]> {
        self.writable_region("as_bytes_mut")
    }

    fn writable_region(&mut self, operation: &'static str) -> Result<&mut [u8]> {
        self.lease.ensure_borrowed(operation)?;
        let descriptor = self.lease.metadata();
        if descriptor.readonly() {
            return Err(BufferError::ReadOnly { operation });
        }
        // SAFETY: 可写描述符意味着导出方保证该区域在借用期间只被本描述符访问；
        // `&mut self` 排除了同一视图上的其它引用。
        let bytes = unsafe { alias::slice_at_mut(descriptor.data_ptr(), descriptor.len()) }?;
        Ok(bytes)
    }

    /// 读取第 `index` 个字节。
    pub fn get(&self, index: usize) -> Result<u8> {
        let bytes = self.as_bytes()?;
        bytes.get(index).copied().ok_or(BufferError::BoundsViolation {
            index,
            len: bytes.len(),
        })
    }

    /// 写入第 `index` 个字节，写入直接落在导出方的存储上。
    pub fn set(&mut self, index: usize, value: u8) -> Result<()> {
        let bytes = self.writable_region("set")?;
        let len = bytes.len();
        let slot = bytes
            .get_mut(index)
            .ok_or(BufferError::BoundsViolation { index, len })?;
        *slot = value;
        Ok(())
    }

    /// 按存储顺序把导出区域视为 `len / itemsize` 个 `T`。
    ///
    /// # Errors
    /// - `itemsize != size_of::<T>()` 或 `len` 不是 `itemsize` 的整数倍：[`BufferError::ItemSizeMismatch`]；
    /// - 描述符带有格式且与 `T` 不兼容：[`BufferError::FormatMismatch`]；
    /// - 指针未按 `T` 对齐：[`BufferError::Alias`]。
    pub fn as_typed<T: Element>(&self) -> Result<&[T]> {
        self.lease.ensure_borrowed("as_typed")?;
        let descriptor = self.lease.metadata();
        let count = typed_len::<T>(descriptor)?;
        // SAFETY: 元素数由 `len / size_of::<T>()` 得出，区域有效性同 `as_bytes`；
        // `Element` 保证任意比特模式都是合法的 `T`。
        let items = unsafe { alias::slice_at(descriptor.data_ptr().cast_const().cast::<T>(), count) }?;
        Ok(items)
    }

    /// [`as_typed`](Self::as_typed) 的可变版本，只读描述符返回 [`BufferError::ReadOnly`]。
    pub fn as_typed_mut<T: Element>(&mut self) -> Result<&mut [T]> {
        self.lease.ensure_borrowed("as_typed_mut")?;
        let descriptor = self.lease.metadata();
        if descriptor.readonly() {
            return Err(BufferError::ReadOnly {
                operation: "as_typed_mut",
            });
        }
        let count = typed_len::<T>(descriptor)?;
        // SAFETY: 同 `as_typed`，独占性同 `as_bytes_mut`。
        let items = unsafe { alias::slice_at_mut(descriptor.data_ptr().cast::<T>(), count) }?;
        Ok(items)
    }

    /// 按 N 维下标读取单个元素的字节。
    ///
    /// # Errors
    /// - 下标维数与 `ndim` 不符：[`BufferError::DimensionMismatch`]；
    /// - 任一维越界：[`BufferError::BoundsViolation`]；
    /// - 描述符含生效的 suboffsets：[`BufferError::IndirectUnsupported`]；
    /// - 按 strides 计算出的元素落在 `[data, data + len)` 之外：[`BufferError::DescriptorMismatch`]。
    pub fn item(&self, index: &[usize]) -> Result<&[u8]> {
        self.lease.ensure_borrowed("item")?;
        let offset = item_offset(self.lease.metadata(), self.lease.flags(), index)?;
        let itemsize = self.itemsize();
        let bytes = self.as_bytes()?;
        Ok(&bytes[offset..offset + itemsize])
    }

    /// [`item`](Self::item) 的可变版本。
    pub fn item_mut(&mut self, index: &[usize]) -> Result<&mut [u8]> {
        self.lease.ensure_borrowed("item_mut")?;
        let offset = item_offset(self.lease.metadata(), self.lease.flags(), index)?;
        let itemsize = self.itemsize();
        let bytes = self.writable_region("item_mut")?;
        Ok(&mut bytes[offset..offset + itemsize])
    }

    /// 按逻辑顺序把所有元素复制到新的 `Vec<u8>`。
    ///
    /// `Contiguity::C` 末维变化最快，`Contiguity::Fortran` 首维变化最快；
    /// `Contiguity::Any` 在布局已连续时按存储顺序复制，否则按 C 顺序。
    pub fn copy_to_vec(&self, order: Contiguity) -> Result<Vec<u8>> {
        self.lease.ensure_borrowed("copy_to_vec")?;
        let descriptor = self.lease.metadata();
        if descriptor.has_indirection() {
            return Err(BufferError::IndirectUnsupported);
        }
        let bytes = self.as_bytes()?;
        if descriptor.is_contiguous(order) {
            return Ok(bytes.to_vec());
        }

        let shape = descriptor.logical_shape();
        let strides = descriptor.logical_strides();
        let itemsize = descriptor.itemsize();
        let flags = self.lease.flags();
        let mut out = Vec::with_capacity(bytes.len());
        if shape.iter().any(|dim| *dim <= 0) {
            return Ok(out);
        }
        let mut index = vec![0usize; shape.len()];
        loop {
            let offset = strided_offset(descriptor, flags, &shape, &strides, &index)?;
            out.extend_from_slice(&bytes[offset..offset + itemsize]);
            if !advance(&mut index, &shape, order) {
                break;
            }
        }
        Ok(out)
    }

    /// 借用中的描述符；释放后返回 [`BufferError::InvalidState`]。
    pub fn descriptor(&self) -> Result<&BufferDescriptor> {
        self.lease.descriptor()
    }

    pub fn flags(&self) -> BufferFlags {
        self.lease.flags()
    }

    pub fn len(&self) -> usize {
        self.lease.metadata().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn itemsize(&self) -> usize {
        self.lease.metadata().itemsize()
    }

    pub fn ndim(&self) -> usize {
        self.lease.metadata().ndim()
    }

    pub fn readonly(&self) -> bool {
        self.lease.metadata().readonly()
    }

    pub fn format(&self) -> Option<&str> {
        self.lease.metadata().format()
    }

    /// 缺省格式按 `"B"` 处理。
    pub fn format_or_default(&self) -> &str {
        self.lease.metadata().format_or_default()
    }

    pub fn shape(&self) -> Option<&[isize]> {
        self.lease.metadata().shape()
    }

    pub fn strides(&self) -> Option<&[isize]> {
        self.lease.metadata().strides()
    }

    pub fn state(&self) -> LeaseState {
        self.lease.state()
    }

    pub fn is_released(&self) -> bool {
        self.lease.is_released()
    }

    /// 归还视图；第二次调用返回 [`BufferError::InvalidState`]。
    pub fn release(&mut self) -> Result<()> {
        self.lease.release()
    }
}

impl<E: BufferExporter + ?Sized> fmt::Debug for BufferView<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptor = self.lease.metadata();
        f.debug_struct("BufferView")
            .field("flags", &self.lease.flags())
            .field("state", &self.lease.state())
            .field("len", &descriptor.len())
            .field("itemsize", &descriptor.itemsize())
            .field("ndim", &descriptor.ndim())
            .field("readonly", &descriptor.readonly())
            .finish()
    }
}

fn typed_len<T: Element>(descriptor: &BufferDescriptor) -> Result<usize> {
    let size = size_of::<T>();
    let itemsize = descriptor.itemsize();
    if itemsize != size || descriptor.len() % size != 0 {
        return Err(BufferError::ItemSizeMismatch {
            expected: size,
            itemsize,
            len: descriptor.len(),
        });
    }
    if let Some(format) = descriptor.format() {
        if !format_matches::<T>(format) {
            return Err(BufferError::FormatMismatch {
                expected: T::FORMAT,
                actual: format.to_owned(),
            });
        }
    }
    Ok(descriptor.len() / size)
}

/// 计算 N 维下标对应元素相对 `data` 的字节偏移，并确认整个元素落在导出区域内。
fn item_offset(descriptor: &BufferDescriptor, flags: BufferFlags, index: &[usize]) -> Result<usize> {
    if descriptor.has_indirection() {
        return Err(BufferError::IndirectUnsupported);
    }
    let shape = descriptor.logical_shape();
    let strides = descriptor.logical_strides();
    strided_offset(descriptor, flags, &shape, &strides, index)
}

/// 以预先取得的 shape 与 strides 计算偏移，供逐项遍历复用。
fn strided_offset(
    descriptor: &BufferDescriptor,
    flags: BufferFlags,
    shape: &[isize],
    strides: &[isize],
    index: &[usize],
) -> Result<usize> {
    if index.len() != shape.len() {
        return Err(BufferError::DimensionMismatch {
            expected: shape.len(),
            actual: index.len(),
        });
    }
    let mut offset: isize = 0;
    for ((position, dim), stride) in index.iter().zip(shape).zip(strides) {
        let extent = usize::try_from(*dim).unwrap_or(0);
        if *position >= extent {
            return Err(BufferError::BoundsViolation {
                index: *position,
                len: extent,
            });
        }
        offset = isize::try_from(*position)
            .ok()
            .and_then(|position| position.checked_mul(*stride))
            .and_then(|step| offset.checked_add(step))
            .ok_or_else(|| BufferError::mismatch(flags, "item offset overflows"))?;
    }
    let itemsize = descriptor.itemsize();
    match usize::try_from(offset) {
        Ok(start) if start.checked_add(itemsize).is_some_and(|end| end <= descriptor.len()) => {
            Ok(start)
        }
        _ => Err(BufferError::mismatch(
            flags,
            format!(
                "item at byte offset {offset} lies outside the exported {} bytes",
                descriptor.len()
            ),
        )),
    }
}

/// 按给定顺序推进多维下标；全部遍历完时返回 `false`。
fn advance(index: &mut [usize], shape: &[isize], order: Contiguity) -> bool {
    let ndim = index.len();
    let mut step = |axis: usize| -> bool {
        index[axis] += 1;
        if (index[axis] as isize) < shape[axis] {
            return true;
        }
        index[axis] = 0;
        false
    };
    match order {
        Contiguity::Fortran => (0..ndim).any(&mut step),
        Contiguity::C | Contiguity::Any => (0..ndim).rev().any(&mut step),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorBuilder;
    use crate::exporter::memory::{ArrayLayout, MemoryExporter};
    use crate::negotiation::request_view;

    #[test]
    fn bytes_are_bounded_and_write_through() {
        let exporter = MemoryExporter::bytes(&[1u8, 2, 3][..]);
        {
            let mut view = request_view(&exporter, BufferFlags::WRITABLE).unwrap();
            assert_eq!(view.get(2).unwrap(), 3);
            assert!(matches!(
                view.get(3),
                Err(BufferError::BoundsViolation { index: 3, len: 3 })
            ));
            view.set(0, 7).unwrap();
        }
        assert_eq!(exporter.snapshot().unwrap(), vec![7, 2, 3]);
    }

    #[test]
    fn read_only_view_rejects_mutation() {
        let exporter = MemoryExporter::bytes(&[1u8, 2][..]);
        let mut view = request_view(&exporter, BufferFlags::SIMPLE).unwrap();
        assert!(view.readonly());
        assert!(matches!(
            view.set(0, 1),
            Err(BufferError::ReadOnly { operation: "set" })
        ));
    }

    #[test]
    fn typed_view_checks_format_and_itemsize() {
        let data: Vec<u8> = [1i32, -2, 3].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let exporter =
            MemoryExporter::array(&data[..], ArrayLayout::new(vec![3], 4, "i"), false).unwrap();
        let view = request_view(&exporter, BufferFlags::RECORDS_RO).unwrap();
        assert_eq!(view.as_typed::<i32>().unwrap(), &[1, -2, 3]);
        assert!(matches!(
            view.as_typed::<u32>(),
            Err(BufferError::FormatMismatch { expected: "I", .. })
        ));
        assert!(matches!(
            view.as_typed::<u16>(),
            Err(BufferError::ItemSizeMismatch { expected: 2, itemsize: 4, .. })
        ));
    }

    #[test]
    fn strided_items_follow_fortran_layout() {
        // 2x3 Fortran 布局：内存顺序为 (0,0) (1,0) (0,1) (1,1) (0,2) (1,2)。
        let exporter = MemoryExporter::array(
            &[0u8, 10, 1, 11, 2, 12][..],
            ArrayLayout::new(vec![2, 3], 1, "B").order(Contiguity::Fortran),
            false,
        )
        .unwrap();
        let view = request_view(&exporter, BufferFlags::F_CONTIGUOUS).unwrap();
        assert_eq!(view.item(&[1, 2]).unwrap(), &[12]);
        assert!(matches!(
            view.item(&[2, 0]),
            Err(BufferError::BoundsViolation { index: 2, len: 2 })
        ));
        assert!(matches!(
            view.item(&[0]),
            Err(BufferError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert_eq!(
            view.copy_to_vec(Contiguity::C).unwrap(),
            vec![0, 1, 2, 10, 11, 12]
        );
        assert_eq!(
            view.copy_to_vec(Contiguity::Fortran).unwrap(),
            vec![0, 10, 1, 11, 2, 12]
        );
    }

    #[test]
    fn advance_walks_every_index_in_requested_order() {
        let shape = [2isize, 3];
        let mut index = [0usize, 0];
        let mut seen = vec![index];
        while advance(&mut index, &shape, Contiguity::C) {
            seen.push(index);
        }
        assert_eq!(seen, vec![[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]);
        assert_eq!(index, [0, 0]);

        let mut index = [0usize, 0];
        let mut seen = vec![index];
        while advance(&mut index, &shape, Contiguity::Fortran) {
            seen.push(index);
        }
        assert_eq!(seen, vec![[0, 0], [1, 0], [0, 1], [1, 1], [0, 2], [1, 2]]);
    }

    #[test]
    fn copy_of_three_dimensional_fortran_layout_reorders_items() {
        // 2x2x2 Fortran 布局，元素值编码为 C 顺序下的序号。
        let exporter = MemoryExporter::array(
            &[0u8, 4, 2, 6, 1, 5, 3, 7][..],
            ArrayLayout::new(vec![2, 2, 2], 1, "B").order(Contiguity::Fortran),
            true,
        )
        .unwrap();
        let view = request_view(&exporter, BufferFlags::STRIDED_RO).unwrap();
        assert_eq!(
            view.copy_to_vec(Contiguity::C).unwrap(),
            vec![0, 1, 2, 3, 4, 5, 6, 7]
        );
        assert_eq!(view.item(&[1, 0, 1]).unwrap(), &[5]);
    }

    struct Indirect {
        storage: [u8; 4],
    }

    // SAFETY: 只读导出，存储在导出方生命周期内不变。
    unsafe impl BufferExporter for Indirect {
        fn fill_descriptor(
            &self,
            flags: BufferFlags,
        ) -> core::result::Result<BufferDescriptor, crate::error::ExportError> {
            DescriptorBuilder::new(self.storage.as_ptr().cast_mut(), 4)
                .suboffsets(vec![0])
                .readonly(true)
                .fill(flags)
        }

        fn release_descriptor(&self, _descriptor: &mut BufferDescriptor) {}
    }

    #[test]
    fn indirect_item_access_is_rejected() {
        let exporter = Indirect { storage: [0; 4] };
        let view = request_view(&exporter, BufferFlags::FULL_RO).unwrap();
        assert!(matches!(
            view.item(&[0]),
            Err(BufferError::IndirectUnsupported)
        ));
        assert!(matches!(
            view.copy_to_vec(Contiguity::C),
            Err(BufferError::IndirectUnsupported)
        ));
        assert_eq!(view.as_bytes().unwrap().len(), 4);
    }

    #[test]
    fn data_access_after_release_is_invalid_but_metadata_remains() {
        let exporter = MemoryExporter::bytes(&[1u8, 2, 3][..]);
        let mut view = request_view(&exporter, BufferFlags::CONTIG_RO).unwrap();
        view.release().unwrap();
        assert!(matches!(
            view.as_bytes(),
            Err(BufferError::InvalidState { operation: "as_bytes" })
        ));
        assert!(view.descriptor().is_err());
        assert_eq!(view.len(), 3);
        assert_eq!(view.shape(), Some(&[3][..]));
        assert_eq!(exporter.export_count(), 0);
    }
}
