//! `spark-bufview` 提供对外部导出方内存的零拷贝缓冲协商、视图与释放协议。
//!
//! # 模块定位（Why）
//! - 消费方需要读写由其它组件（C 库、运行时、内存映射区）持有的内存，且不能复制；
//! - 双方先通过一组可组合的能力标志协商视图形态（一维字节或 N 维带步长、连续或间接、
//!   是否带类型），再由导出方填写描述符，最后由消费方恰好归还一次。
//!
//! # 设计概要（How）
//! - [`flags`]：与 CPython `PyBUF_*` 逐位一致的 [`BufferFlags`] 与权威组合表；
//! - [`descriptor`]：导出方填写的 [`BufferDescriptor`] 及按标志裁剪字段的构造器；
//! - [`exporter`]：[`BufferExporter`] 契约与基于 `BytesMut` 的 [`MemoryExporter`]；
//! - [`negotiation`]：[`request_view`]、[`with_view`] 与携带策略的 [`Negotiator`]；
//! - [`alias`] / [`element`] / [`view`]：把 `(指针, 长度)` 变为有界切片的唯一原语，以及建立在其上的视图；
//! - [`lease`]：两阶段租约，保证释放恰好发生一次；
//! - [`ffi`]：`#[repr(C)]` 记录与 C 入口适配；
//! - [`error`] / [`config`]：统一错误域与 TOML 策略。
//!
//! # 使用约定（What）
//! - 视图不可跨线程传递；对同一导出方的并发协商是否允许由导出方决定；
//! - 库本身不安装任何 `tracing` 订阅者。

pub mod alias;
pub mod config;
pub mod descriptor;
pub mod element;
pub mod error;
pub mod exporter;
pub mod ffi;
pub mod flags;
pub mod lease;
pub mod negotiation;
pub mod view;

pub use alias::{AliasError, slice_at, slice_at_mut};
pub use config::NegotiationPolicy;
pub use descriptor::{BufferDescriptor, DescriptorBuilder, contiguous_strides};
pub use element::Element;
pub use error::{BufferError, ExportError, Result};
pub use exporter::BufferExporter;
pub use exporter::memory::{ArrayLayout, ExportStats, MemoryExporter, StorageError};
pub use flags::{BufferFlags, COMPOSITES, Contiguity, FlagDefinition};
pub use lease::{Lease, LeaseState};
pub use negotiation::{Negotiator, request_view, with_view};
pub use view::BufferView;
