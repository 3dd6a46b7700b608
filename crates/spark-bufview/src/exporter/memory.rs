use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use bytes::BytesMut;
use spin::Mutex;
use thiserror::Error;

use crate::descriptor::{BufferDescriptor, DEFAULT_FORMAT, DescriptorBuilder, shape_bytes};
use crate::error::ExportError;
use crate::exporter::BufferExporter;
use crate::flags::{BufferFlags, Contiguity};

/// 参考导出方在自身存储操作上的失败。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum StorageError {
    /// 仍有未归还的导出，存储不能被调整或观察。
    #[error("storage has outstanding exports (shared: {shared}, exclusive: {exclusive})")]
    Busy { shared: usize, exclusive: bool },

    /// 布局描述的字节数与存储长度不一致。
    #[error("layout covers {expected} bytes but storage holds {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    /// 多维布局的存储不允许改变长度。
    #[error("storage with a multi-dimensional layout cannot be resized")]
    FixedLayout,
}

/// 存储的逻辑布局：shape、元素大小、格式与存储顺序。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayLayout {
    shape: Vec<isize>,
    itemsize: usize,
    format: String,
    order: Contiguity,
}

impl ArrayLayout {
    /// 长度为 `len` 的一维无符号字节布局。
    pub fn bytes(len: usize) -> Self {
        Self {
            shape: vec![len as isize],
            itemsize: 1,
            format: DEFAULT_FORMAT.to_owned(),
            order: Contiguity::C,
        }
    }

    /// 任意维度的 C 顺序布局。
    pub fn new(shape: Vec<isize>, itemsize: usize, format: impl Into<String>) -> Self {
        Self {
            shape,
            itemsize,
            format: format.into(),
            order: Contiguity::C,
        }
    }

    /// 切换存储顺序（`Contiguity::Any` 按 C 顺序处理）。
    pub fn order(mut self, order: Contiguity) -> Self {
        self.order = order;
        self
    }

    pub fn shape(&self) -> &[isize] {
        &self.shape
    }

    pub fn itemsize(&self) -> usize {
        self.itemsize
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    fn is_flat_bytes(&self) -> bool {
        self.shape.len() == 1 && self.itemsize == 1
    }
}

/// 导出计数快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// 当前未归还的只读导出数。
    pub active_shared: usize,
    /// 当前是否存在未归还的可写导出。
    pub active_exclusive: bool,
    /// 累计成功导出次数。
    pub total_exported: u64,
    /// 累计归还次数。
    pub total_released: u64,
}

#[derive(Debug, Default)]
struct ExportLedger {
    shared: usize,
    exclusive: bool,
}

/// 导出方实例编号；地址会被复用，编号不会。
static NEXT_OWNER: AtomicUsize = AtomicUsize::new(1);

/// 描述符中携带的导出凭据，释放时据此更新账本。
#[derive(Debug)]
struct ExportTicket {
    owner: usize,
    exclusive: bool,
}

/// 基于 `BytesMut` 的参考导出方。
///
/// # 设计动机（Why）
/// - 为消费方、测试与基准提供一个遵守全部导出契约的真实导出方，而不是只存在于测试里的替身；
/// - 存储选用 `bytes::BytesMut`，与框架其它缓冲实现保持同一内存模型。
///
/// # 核心机制（How）
/// - `storage` 由 `spin::Mutex` 保护，仅在取指针、扩容、快照时短暂加锁；
/// - `ledger` 记录未归还的导出：任意数量的只读导出，**或**恰好一个可写导出；
///   冲突的请求以 [`ExportError::Unavailable`] 拒绝，这是该导出方对“并发协商”问题的答案；
/// - 非 `WRITABLE` 请求得到的描述符一律标记为只读，共享导出因此不会互相写入；
/// - 每个描述符携带 `ExportTicket`，释放时按凭据扣减账本，外来描述符被忽略并记录告警。
///
/// # 契约说明（What）
/// - 导出期间存储既不扩容也不移动，数据指针在归还前始终有效；
/// - [`extend_from_slice`](Self::extend_from_slice) 在存在任何导出时失败，
///   [`snapshot`](Self::snapshot) 在存在可写导出时失败。
pub struct MemoryExporter {
    id: usize,
    storage: Mutex<BytesMut>,
    layout: Mutex<ArrayLayout>,
    readonly: bool,
    ledger: Mutex<ExportLedger>,
    exported: AtomicU64,
    released: AtomicU64,
}

impl MemoryExporter {
    /// 可写的一维字节导出方。
    pub fn bytes(data: impl Into<BytesMut>) -> Self {
        let storage = data.into();
        let layout = ArrayLayout::bytes(storage.len());
        Self::with_parts(storage, layout, false)
    }

    /// 只读的一维字节导出方，任何 `WRITABLE` 请求都会被拒绝。
    pub fn read_only(data: impl Into<BytesMut>) -> Self {
        let storage = data.into();
        let layout = ArrayLayout::bytes(storage.len());
        Self::with_parts(storage, layout, true)
    }

    /// 按给定布局导出的多维数组。
    ///
    /// # Errors
    /// 布局覆盖的字节数与 `data` 长度不一致时返回 [`StorageError::LayoutMismatch`]。
    pub fn array(
        data: impl Into<BytesMut>,
        layout: ArrayLayout,
        readonly: bool,
    ) -> Result<Self, StorageError> {
        let storage = data.into();
        let expected = shape_bytes(&layout.shape, layout.itemsize).unwrap_or(usize::MAX);
        if expected != storage.len() {
            return Err(StorageError::LayoutMismatch {
                expected,
                actual: storage.len(),
            });
        }
        Ok(Self::with_parts(storage, layout, readonly))
    }

    fn with_parts(storage: BytesMut, layout: ArrayLayout, readonly: bool) -> Self {
        Self {
            id: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            storage: Mutex::new(storage),
            layout: Mutex::new(layout),
            readonly,
            ledger: Mutex::new(ExportLedger::default()),
            exported: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.readonly
    }

    pub fn len(&self) -> usize {
        self.storage.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> ArrayLayout {
        self.layout.lock().clone()
    }

    /// 当前未归还的导出数（只读与可写合计）。
    pub fn export_count(&self) -> usize {
        let ledger = self.ledger.lock();
        ledger.shared + usize::from(ledger.exclusive)
    }

    pub fn stats(&self) -> ExportStats {
        let ledger = self.ledger.lock();
        ExportStats {
            active_shared: ledger.shared,
            active_exclusive: ledger.exclusive,
            total_exported: self.exported.load(Ordering::Relaxed),
            total_released: self.released.load(Ordering::Relaxed),
        }
    }

    /// 复制当前内容。
    ///
    /// # Errors
    /// 存在未归还的可写导出时返回 [`StorageError::Busy`]，此时消费方可能正在写入。
    pub fn snapshot(&self) -> Result<Vec<u8>, StorageError> {
        // 复制完成前持有账本锁，可写导出无法在检查与复制之间插入。
        let ledger = self.ledger.lock();
        if ledger.exclusive {
            return Err(StorageError::Busy {
                shared: ledger.shared,
                exclusive: true,
            });
        }
        let copy = self.storage.lock().to_vec();
        drop(ledger);
        Ok(copy)
    }

    /// 在末尾追加字节。
    ///
    /// # Errors
    /// - 存在任何未归还导出时返回 [`StorageError::Busy`]，扩容可能移动已导出的内存；
    /// - 多维布局返回 [`StorageError::FixedLayout`]。
    pub fn extend_from_slice(&self, data: &[u8]) -> Result<(), StorageError> {
        let ledger = self.ledger.lock();
        if ledger.shared > 0 || ledger.exclusive {
            return Err(StorageError::Busy {
                shared: ledger.shared,
                exclusive: ledger.exclusive,
            });
        }
        let mut layout = self.layout.lock();
        if !layout.is_flat_bytes() {
            return Err(StorageError::FixedLayout);
        }
        let mut storage = self.storage.lock();
        storage.extend_from_slice(data);
        layout.shape = vec![storage.len() as isize];
        Ok(())
    }

    /// 取回底层存储；按值接收保证此时不存在任何借用中的视图。
    pub fn into_bytes(self) -> BytesMut {
        self.storage.into_inner()
    }
}

// SAFETY: 导出期间存储不会扩容（`extend_from_slice` 在有导出时拒绝），指针保持有效；
// 可写导出独占，且期间 `snapshot` 拒绝读取；只读导出期间不存在任何写入路径。
unsafe impl BufferExporter for MemoryExporter {
    fn fill_descriptor(&self, flags: BufferFlags) -> Result<BufferDescriptor, ExportError> {
        let writable = flags.requires_writable();
        if writable && self.readonly {
            tracing::debug!(%flags, "refusing writable export of read-only storage");
            return Err(ExportError::unavailable("object is not writable"));
        }

        let mut ledger = self.ledger.lock();
        if ledger.exclusive {
            return Err(ExportError::unavailable(
                "storage has an outstanding writable export",
            ));
        }
        if writable && ledger.shared > 0 {
            return Err(ExportError::unavailable(
                "writable export requires that no other export is outstanding",
            ));
        }

        let layout = self.layout.lock().clone();
        let (data, len) = {
            let mut storage = self.storage.lock();
            (storage.as_mut_ptr(), storage.len())
        };
        let mut descriptor = DescriptorBuilder::new(data, len)
            .itemsize(layout.itemsize)
            .format(layout.format)
            .shape(layout.shape)
            .order(layout.order)
            .readonly(!writable)
            .fill(flags)?;
        descriptor.set_exporter_state(ExportTicket {
            owner: self.id,
            exclusive: writable,
        });

        if writable {
            ledger.exclusive = true;
        } else {
            ledger.shared += 1;
        }
        self.exported.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%flags, len, exclusive = writable, "memory export granted");
        Ok(descriptor)
    }

    fn release_descriptor(&self, descriptor: &mut BufferDescriptor) {
        let owned = descriptor
            .exporter_state::<ExportTicket>()
            .is_some_and(|ticket| ticket.owner == self.id);
        if !owned {
            tracing::warn!("ignoring release of a descriptor not exported by this storage");
            return;
        }
        let Some(ticket) = descriptor.take_exporter_state::<ExportTicket>() else {
            return;
        };
        let mut ledger = self.ledger.lock();
        if ticket.exclusive {
            ledger.exclusive = false;
        } else {
            ledger.shared = ledger.shared.saturating_sub(1);
        }
        self.released.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            exclusive = ticket.exclusive,
            remaining = ledger.shared + usize::from(ledger.exclusive),
            "memory export released"
        );
    }
}
