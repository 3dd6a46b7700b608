//! 释放协议：两阶段租约。
//!
//! # 模块定位（Why）
//! - 每次成功协商都对应导出方侧的一份“被借出”状态，必须恰好归还一次；
//!   少还会让导出方永久钉住内存，多还会破坏导出方的计数；
//! - 把这一约束收敛到 [`Lease`]：显式释放、作用域结束时的 `Drop` 释放与重复释放检测都在这里完成。
//!
//! # 结构设计（How）
//! - `state` 记录 [`LeaseState::Borrowed`] / [`LeaseState::Released`] 两个阶段；
//! - [`Lease::release`] 在 `Borrowed` 阶段调用导出方的 `release_descriptor` 并切换状态，
//!   之后的任何调用都返回 [`BufferError::InvalidState`]，且不会再触达导出方；
//! - `Drop` 只在仍处于 `Borrowed` 时补一次释放。

use core::fmt;

use crate::descriptor::BufferDescriptor;
use crate::error::{BufferError, Result};
use crate::exporter::BufferExporter;
use crate::flags::BufferFlags;

/// 租约所处的阶段。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LeaseState {
    /// 描述符仍由消费方持有，导出方的内存被钉住。
    Borrowed,
    /// 已归还导出方，描述符中的指针不得再使用。
    Released,
}

/// 一次成功协商的租约：导出方引用 + 描述符 + 请求标志。
///
/// 生命周期 `'e` 把租约绑在导出方的借用上，导出方因此不可能先于租约被销毁。
pub struct Lease<'e, E: BufferExporter + ?Sized> {
    exporter: &'e E,
    descriptor: BufferDescriptor,
    flags: BufferFlags,
    state: LeaseState,
}

impl<'e, E: BufferExporter + ?Sized> Lease<'e, E> {
    pub(crate) fn new(exporter: &'e E, descriptor: BufferDescriptor, flags: BufferFlags) -> Self {
        Self {
            exporter,
            descriptor,
            flags,
            state: LeaseState::Borrowed,
        }
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        self.state == LeaseState::Released
    }

    /// 协商时使用的标志。
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    pub fn exporter(&self) -> &'e E {
        self.exporter
    }

    /// 借用中的描述符。
    ///
    /// # Errors
    /// 租约已释放时返回 [`BufferError::InvalidState`]。
    pub fn descriptor(&self) -> Result<&BufferDescriptor> {
        self.ensure_borrowed("descriptor")?;
        Ok(&self.descriptor)
    }

    /// 不论阶段如何都可读取的元数据；释放后指针不得再被解引用。
    pub(crate) fn metadata(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub(crate) fn ensure_borrowed(&self, operation: &'static str) -> Result<()> {
        match self.state {
            LeaseState::Borrowed => Ok(()),
            LeaseState::Released => Err(BufferError::InvalidState { operation }),
        }
    }

    /// 归还描述符。
    ///
    /// # 契约说明（What）
    /// - 首次调用触发导出方的 `release_descriptor` 并进入 `Released`；
    /// - 再次调用返回 [`BufferError::InvalidState`]，导出方不会被二次通知。
    pub fn release(&mut self) -> Result<()> {
        if self.state == LeaseState::Released {
            tracing::warn!(flags = %self.flags, "buffer released more than once");
            return Err(BufferError::InvalidState {
                operation: "release",
            });
        }
        self.release_inner();
        Ok(())
    }

    pub(crate) fn release_inner(&mut self) {
        self.exporter.release_descriptor(&mut self.descriptor);
        self.state = LeaseState::Released;
        tracing::trace!(flags = %self.flags, len = self.descriptor.len(), "buffer released");
    }
}

impl<E: BufferExporter + ?Sized> Drop for Lease<'_, E> {
    fn drop(&mut self) {
        if self.state == LeaseState::Borrowed {
            tracing::debug!(flags = %self.flags, "releasing buffer on drop");
            self.release_inner();
        }
    }
}

impl<E: BufferExporter + ?Sized> fmt::Debug for Lease<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("flags", &self.flags)
            .field("state", &self.state)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
