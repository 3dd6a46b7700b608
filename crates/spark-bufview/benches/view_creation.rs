use criterion::{BenchmarkId, Criterion, black_box};
use spark_bufview::{BufferFlags, MemoryExporter, request_view, slice_at};
use std::{env, time::Duration};

/// 视图创建成本基准。
///
/// # 设计背景（Why）
/// - 零拷贝的承诺意味着协商与建立视图的成本与导出区域长度无关；
///   若实现中混入复制，成本会随长度线性增长，这里以多个长度对照观察。
///
/// # 逻辑解析（How）
/// - `slice_at`：只测别名原语；
/// - `negotiate`：完整的协商、校验、读取首字节与释放流程，存储来自 `MemoryExporter`。
fn bench_view_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_creation");
    for len in [64usize, 4 * 1024, 1024 * 1024] {
        let storage = vec![7u8; len];
        group.bench_with_input(BenchmarkId::new("slice_at", len), &storage, |b, storage| {
            b.iter(|| {
                let view = unsafe { slice_at(black_box(storage.as_ptr()), storage.len()) }.unwrap();
                black_box(view.len())
            });
        });

        let exporter = MemoryExporter::bytes(&storage[..]);
        group.bench_with_input(BenchmarkId::new("negotiate", len), &exporter, |b, exporter| {
            b.iter(|| {
                let view = request_view(exporter, black_box(BufferFlags::CONTIG_RO)).unwrap();
                black_box(view.get(0).unwrap())
            });
        });
    }
    group.finish();
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_view_creation(&mut criterion);
    criterion.final_summary();
}
