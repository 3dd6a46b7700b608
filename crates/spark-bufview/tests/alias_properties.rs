//! 别名原语与视图的性质测试。
//!
//! # 教案级注释概览
//! - **核心目标 (Why)**：`(指针, 长度)` 到切片的转换是全部 `unsafe` 的集中点，
//!   需要对任意长度、任意前缀验证“长度恰好为 n、逐字节等于原存储、索引 n 被拒绝”；
//! - **设计手法 (How)**：使用 Proptest 生成随机存储与前缀长度，既直接调用 [`slice_at`]，
//!   也经由完整的协商路径（`MemoryExporter` + `request_view`）观察同一组性质；
//! - **合同 (What)**：任一性质失败时 Proptest 会收缩到最小反例。

use proptest::prelude::*;
use spark_bufview::{
    AliasError, BufferError, BufferFlags, Contiguity, MemoryExporter, request_view, slice_at,
    slice_at_mut,
};

proptest! {
    #[test]
    fn prefix_view_matches_storage(storage in proptest::collection::vec(any::<u8>(), 0..256), cut in 0usize..256) {
        let n = cut.min(storage.len());
        let view = unsafe { slice_at(storage.as_ptr(), n) }.expect("有效前缀");
        prop_assert_eq!(view.len(), n);
        for (i, byte) in view.iter().enumerate() {
            prop_assert_eq!(*byte, unsafe { *storage.as_ptr().add(i) });
        }
        prop_assert!(view.get(n).is_none());
    }

    #[test]
    fn typed_view_covers_whole_words(words in proptest::collection::vec(any::<u32>(), 0..64)) {
        let view = unsafe { slice_at(words.as_ptr(), words.len()) }.expect("对齐的 u32 存储");
        prop_assert_eq!(view, &words[..]);
    }

    #[test]
    fn negotiated_view_is_bounded(storage in proptest::collection::vec(any::<u8>(), 0..128), probe in 0usize..256) {
        let exporter = MemoryExporter::bytes(&storage[..]);
        let view = request_view(&exporter, BufferFlags::SIMPLE).expect("SIMPLE 总能满足");
        prop_assert_eq!(view.as_bytes().expect("借用中可读"), &storage[..]);
        match view.get(probe) {
            Ok(byte) => prop_assert_eq!(byte, storage[probe]),
            Err(BufferError::BoundsViolation { index, len }) => {
                prop_assert!(probe >= storage.len());
                prop_assert_eq!((index, len), (probe, storage.len()));
            }
            Err(other) => prop_assert!(false, "意外的错误: {other}"),
        }
    }

    #[test]
    fn row_and_column_copies_agree(rows in 1isize..6, cols in 1isize..6) {
        let len = (rows * cols) as usize;
        let storage: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let layout = spark_bufview::ArrayLayout::new(vec![rows, cols], 1, "B");
        let exporter = MemoryExporter::array(&storage[..], layout, true).expect("布局覆盖存储");
        let view = request_view(&exporter, BufferFlags::STRIDED_RO).expect("C 布局满足 STRIDES");
        prop_assert_eq!(view.copy_to_vec(Contiguity::C).expect("可复制"), storage.clone());
        let fortran = view.copy_to_vec(Contiguity::Fortran).expect("可复制");
        for r in 0..rows as usize {
            for c in 0..cols as usize {
                prop_assert_eq!(fortran[c * rows as usize + r], storage[r * cols as usize + c]);
            }
        }
    }
}

#[test]
fn null_zero_is_empty_and_null_nonzero_is_rejected() {
    let empty = unsafe { slice_at::<u64>(std::ptr::null(), 0) }.expect("规范空切片");
    assert!(empty.is_empty());
    let err = unsafe { slice_at_mut::<u8>(std::ptr::null_mut(), 1) }.expect_err("空指针不可带长度");
    assert_eq!(err, AliasError::Null { len: 1 });
}
