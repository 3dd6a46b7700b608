//! 协商协议：消费方表达能力，导出方应答描述符。
//!
//! # 模块定位（Why）
//! - 消费方只需声明“我能处理哪种形态的视图”（[`BufferFlags`]），其余都由导出方决定；
//! - 协商失败不留下任何需要释放的状态：导出方拒绝时没有描述符，导出方违约时描述符被立即归还。
//!
//! # 执行流程（How）
//! 1. 调用 [`BufferExporter::fill_descriptor`]；失败映射为 [`BufferError::NegotiationFailed`]；
//! 2. 按策略执行 [`BufferDescriptor::check_against`](crate::descriptor::BufferDescriptor::check_against)，
//!    不一致时先归还再返回 [`BufferError::DescriptorMismatch`]；
//! 3. 把描述符装入 [`Lease`] 与 [`BufferView`]。
//!
//! # 契约说明（What）
//! - 本模块不对同一导出方上的并发协商做任何串行化，是否允许由导出方自行决定；
//! - 每次协商产生一个 `debug` 级 span，字段包含 `flags` 与结果。

use crate::config::NegotiationPolicy;
use crate::error::{BufferError, Result};
use crate::exporter::BufferExporter;
use crate::flags::BufferFlags;
use crate::lease::Lease;
use crate::view::BufferView;

/// 以 `flags` 向导出方请求视图，并校验导出方的应答。
///
/// # Errors
/// - 导出方拒绝或失败：[`BufferError::NegotiationFailed`]；
/// - 导出方返回的描述符与 `flags` 不一致：[`BufferError::DescriptorMismatch`]。
pub fn request_view<E>(exporter: &E, flags: BufferFlags) -> Result<BufferView<'_, E>>
where
    E: BufferExporter + ?Sized,
{
    negotiate(exporter, flags, true)
}

/// 作用域式获取：闭包返回后（包括返回 `Err`）视图必定被归还，panic 时由 `Drop` 归还。
///
/// 闭包内已显式释放的视图不会被二次释放。返回闭包的结果；闭包成功而释放失败时返回释放错误。
pub fn with_view<E, R, F>(exporter: &E, flags: BufferFlags, scope: F) -> Result<R>
where
    E: BufferExporter + ?Sized,
    F: FnOnce(&mut BufferView<'_, E>) -> Result<R>,
{
    let mut view = request_view(exporter, flags)?;
    let outcome = scope(&mut view);
    let released = if view.is_released() {
        Ok(())
    } else {
        view.release()
    };
    let value = outcome?;
    released?;
    Ok(value)
}

fn negotiate<E>(exporter: &E, flags: BufferFlags, verify: bool) -> Result<BufferView<'_, E>>
where
    E: BufferExporter + ?Sized,
{
    let span = tracing::debug_span!("bufview.negotiate", %flags, outcome = tracing::field::Empty);
    let _entered = span.enter();

    let descriptor = match exporter.fill_descriptor(flags) {
        Ok(descriptor) => descriptor,
        Err(source) => {
            span.record("outcome", source.code());
            tracing::debug!(error = %source, "exporter refused buffer request");
            return Err(BufferError::NegotiationFailed { flags, source });
        }
    };

    let mut lease = Lease::new(exporter, descriptor, flags);
    if verify {
        if let Err(err) = lease.metadata().check_against(flags) {
            span.record("outcome", err.code());
            tracing::warn!(error = %err, "exporter violated the descriptor contract; releasing");
            lease.release_inner();
            return Err(err);
        }
    }

    span.record("outcome", "granted");
    let descriptor = lease.metadata();
    tracing::debug!(
        len = descriptor.len(),
        itemsize = descriptor.itemsize(),
        ndim = descriptor.ndim(),
        readonly = descriptor.readonly(),
        "buffer negotiated"
    );
    Ok(BufferView::new(lease))
}

/// 携带协商策略的请求入口。
///
/// # 教案式说明
/// - **意图 (Why)**：服务通常对同一类导出方反复使用同一组标志，把它们放进配置而不是散落在调用点；
/// - **契约 (What)**：[`request`](Self::request) 使用策略中的默认标志，
///   [`request_with`](Self::request_with) 临时覆盖；`verify_descriptors = false` 时跳过应答校验，
///   只适用于完全受信任的导出方；
/// - **执行 (How)**：构造时一次性解析标志名，后续请求不再查表。
#[derive(Clone, Debug)]
pub struct Negotiator {
    policy: NegotiationPolicy,
    default_flags: BufferFlags,
}

impl Negotiator {
    /// # Errors
    /// 策略中的标志名无法识别时返回 [`BufferError::Config`]。
    pub fn new(policy: NegotiationPolicy) -> Result<Self> {
        let default_flags = policy.default_flags()?;
        Ok(Self {
            policy,
            default_flags,
        })
    }

    pub fn policy(&self) -> &NegotiationPolicy {
        &self.policy
    }

    pub fn default_flags(&self) -> BufferFlags {
        self.default_flags
    }

    pub fn request<'e, E>(&self, exporter: &'e E) -> Result<BufferView<'e, E>>
    where
        E: BufferExporter + ?Sized,
    {
        self.request_with(exporter, self.default_flags)
    }

    pub fn request_with<'e, E>(&self, exporter: &'e E, flags: BufferFlags) -> Result<BufferView<'e, E>>
    where
        E: BufferExporter + ?Sized,
    {
        negotiate(exporter, flags, self.policy.verify_descriptors)
    }
}

impl Default for Negotiator {
    fn default() -> Self {
        Self {
            policy: NegotiationPolicy::default(),
            default_flags: BufferFlags::SIMPLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use tracing_test::traced_test;

    use super::*;
    use crate::descriptor::{BufferDescriptor, DescriptorBuilder};
    use crate::error::{ExportError, codes};
    use crate::exporter::memory::MemoryExporter;

    #[test]
    fn refused_negotiation_leaves_nothing_pinned() {
        let exporter = MemoryExporter::read_only(&b"xyz"[..]);
        let err = request_view(&exporter, BufferFlags::WRITABLE).unwrap_err();
        assert!(matches!(err, BufferError::NegotiationFailed { flags, .. } if flags == BufferFlags::WRITABLE));
        assert_eq!(exporter.export_count(), 0);
    }

    #[test]
    fn with_view_releases_on_error() {
        let exporter = MemoryExporter::bytes(&b"xyz"[..]);
        let result: Result<()> = with_view(&exporter, BufferFlags::SIMPLE, |view| {
            view.get(10)?;
            Ok(())
        });
        assert!(matches!(result, Err(BufferError::BoundsViolation { index: 10, len: 3 })));
        assert_eq!(exporter.export_count(), 0);
    }

    #[test]
    fn with_view_tolerates_explicit_release() {
        let exporter = MemoryExporter::bytes(&b"xyz"[..]);
        let first = with_view(&exporter, BufferFlags::CONTIG_RO, |view| {
            let first = view.get(0)?;
            view.release()?;
            Ok(first)
        })
        .unwrap();
        assert_eq!(first, b'x');
        assert_eq!(exporter.stats().total_released, 1);
    }

    /// 无视标志、总是填满全部字段的导出方。
    struct Overfilling {
        storage: [u8; 4],
        releases: Cell<usize>,
    }

    // SAFETY: 只读导出，存储在导出方生命周期内不变。
    unsafe impl BufferExporter for Overfilling {
        fn fill_descriptor(
            &self,
            _flags: BufferFlags,
        ) -> core::result::Result<BufferDescriptor, ExportError> {
            Ok(DescriptorBuilder::new(self.storage.as_ptr().cast_mut(), 4)
                .readonly(true)
                .build_unchecked())
        }

        fn release_descriptor(&self, _descriptor: &mut BufferDescriptor) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    #[test]
    #[traced_test]
    fn contract_violation_is_released_and_logged() {
        let exporter = Overfilling {
            storage: [0; 4],
            releases: Cell::new(0),
        };
        let err = request_view(&exporter, BufferFlags::SIMPLE).unwrap_err();
        assert_eq!(err.code(), codes::DESCRIPTOR_MISMATCH);
        assert_eq!(exporter.releases.get(), 1);
        assert!(logs_contain("violated the descriptor contract"));
    }

    #[test]
    fn unverified_negotiator_trusts_the_exporter() {
        let exporter = Overfilling {
            storage: [0; 4],
            releases: Cell::new(0),
        };
        let negotiator = Negotiator::new(NegotiationPolicy {
            default_flags: Vec::new(),
            verify_descriptors: false,
        })
        .unwrap();
        let view = negotiator.request(&exporter).unwrap();
        assert_eq!(view.shape(), Some(&[4][..]));
        drop(view);
        assert_eq!(exporter.releases.get(), 1);
    }

    #[test]
    #[traced_test]
    fn refusal_is_logged_at_debug() {
        let exporter = MemoryExporter::read_only(&b"xyz"[..]);
        assert!(request_view(&exporter, BufferFlags::CONTIG).is_err());
        assert!(logs_contain("exporter refused buffer request"));
    }

    #[test]
    fn negotiator_uses_policy_flags() {
        let policy = NegotiationPolicy {
            default_flags: vec!["CONTIG".to_owned()],
            verify_descriptors: true,
        };
        let negotiator = Negotiator::new(policy).unwrap();
        let exporter = MemoryExporter::bytes(&b"ab"[..]);
        let view = negotiator.request(&exporter).unwrap();
        assert_eq!(view.flags(), BufferFlags::CONTIG);
        assert!(!view.readonly());
        assert_eq!(view.shape(), Some(&[2][..]));
    }
}
