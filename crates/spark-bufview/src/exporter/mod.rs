//! 导出方契约与内置导出方实现。
//!
//! # 模块定位（Why）
//! - 导出方是内存的所有者，消费方只能通过它的两个入口交互：按标志填充描述符、归还描述符；
//! - 该契约与 `spark-buffer` 中的回收钩子同构：租借结束时必须恰好通知所有者一次，
//!   区别在于这里的“租借”是对外部内存的零拷贝借用，而非池化分配。
//!
//! # 结构安排（How）
//! - [`BufferExporter`]：Rust 侧契约，由 [`crate::negotiation`] 与 [`crate::lease`] 驱动；
//! - [`memory::MemoryExporter`]：基于 `BytesMut` 的参考实现，附带导出计数与并发策略；
//! - C ABI 导出方的适配见 [`crate::ffi`]。

pub mod memory;

use std::rc::Rc;
use std::sync::Arc;

use crate::descriptor::BufferDescriptor;
use crate::error::ExportError;
use crate::flags::BufferFlags;

/// 导出方契约。
///
/// # 教案式说明
/// - **意图 (Why)**：把“能否以某种形态共享内存”的决定权留给真正掌握存储布局的一方，
///   消费方只表达能力、接收结果；
/// - **契约 (What)**：
///   - `fill_descriptor` 成功时返回与 `flags` 一致的描述符，未请求的字段保持缺省；
///     无法满足时返回 [`ExportError`]，且不得留下任何需要释放的状态；
///   - `release_descriptor` 对每个成功填充的描述符恰好调用一次，由 [`crate::lease::Lease`] 保证；
/// - **执行 (How)**：导出方可在描述符的 `exporter_state` 中存放识别信息，释放时取回。
///
/// # Safety
/// 实现者必须保证，从 `fill_descriptor` 成功返回起直到对应的 `release_descriptor` 调用为止：
/// - 若 `data` 非空，`[data, data + len)` 是一段有效、已初始化的内存，且不会被移动或回收；
/// - 若描述符 `readonly == false`，该区域不会被导出方自身或其它任何描述符同时读写；
/// - 若 `readonly == true`，该区域在此期间不会被修改。
///
/// 消费方据此在安全代码中把区域当作普通切片使用。
pub unsafe trait BufferExporter {
    /// 按标志填充描述符。
    fn fill_descriptor(&self, flags: BufferFlags) -> Result<BufferDescriptor, ExportError>;

    /// 归还描述符，结束本次借用。
    fn release_descriptor(&self, descriptor: &mut BufferDescriptor);
}

// SAFETY: 转发到被引用的导出方，保证条件不变。
unsafe impl<E: BufferExporter + ?Sized> BufferExporter for &E {
    fn fill_descriptor(&self, flags: BufferFlags) -> Result<BufferDescriptor, ExportError> {
        (**self).fill_descriptor(flags)
    }

    fn release_descriptor(&self, descriptor: &mut BufferDescriptor) {
        (**self).release_descriptor(descriptor)
    }
}

// SAFETY: 同上。
unsafe impl<E: BufferExporter + ?Sized> BufferExporter for Arc<E> {
    fn fill_descriptor(&self, flags: BufferFlags) -> Result<BufferDescriptor, ExportError> {
        (**self).fill_descriptor(flags)
    }

    fn release_descriptor(&self, descriptor: &mut BufferDescriptor) {
        (**self).release_descriptor(descriptor)
    }
}

// SAFETY: 同上。
unsafe impl<E: BufferExporter + ?Sized> BufferExporter for Rc<E> {
    fn fill_descriptor(&self, flags: BufferFlags) -> Result<BufferDescriptor, ExportError> {
        (**self).fill_descriptor(flags)
    }

    fn release_descriptor(&self, descriptor: &mut BufferDescriptor) {
        (**self).release_descriptor(descriptor)
    }
}
