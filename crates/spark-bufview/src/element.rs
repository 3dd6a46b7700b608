//! 类型化视图的元素类型与格式码匹配。
//!
//! 导出方以 struct-module 风格的格式字符串描述元素（`"B"`、`"<i"`、`"=d"` 等）。
//! 这里只接受单个原生数值码，可带 `@`/`=`/`<`/`>`/`!` 字节序前缀；
//! 非本机字节序的前缀视为不兼容，避免静默地按错误的字节序解释数据。

mod sealed {
    pub trait Sealed {}
}

/// 可作为类型化视图元素的原生数值类型。
///
/// # Safety
/// 实现者必须是“任意比特模式都合法”的 `Copy` 类型，且没有填充字节；
/// trait 已封闭，只对下列数值类型实现。
pub unsafe trait Element: sealed::Sealed + Copy + 'static {
    /// 首选格式码，用于错误消息。
    const FORMAT: &'static str;
    /// 所有可接受的格式码。
    const ACCEPTED: &'static [char];
}

macro_rules! impl_element {
    ($($ty:ty => $primary:literal, [$($code:literal),+]);+ $(;)?) => {
        $(
            impl sealed::Sealed for $ty {}
            // SAFETY: 原生整数与浮点类型没有无效比特模式，也没有填充。
            unsafe impl Element for $ty {
                const FORMAT: &'static str = $primary;
                const ACCEPTED: &'static [char] = &[$($code),+];
            }
        )+
    };
}

impl_element! {
    u8 => "B", ['B', 'c'];
    i8 => "b", ['b'];
    u16 => "H", ['H'];
    i16 => "h", ['h'];
    u32 => "I", ['I'];
    i32 => "i", ['i'];
    u64 => "Q", ['Q'];
    i64 => "q", ['q'];
    usize => "N", ['N'];
    isize => "n", ['n'];
    f32 => "f", ['f'];
    f64 => "d", ['d'];
}

#[cfg(target_pointer_width = "64")]
const LONG_IS_64: bool = !cfg!(windows);
#[cfg(not(target_pointer_width = "64"))]
const LONG_IS_64: bool = false;

/// 判断格式字符串是否描述类型 `T`。
pub fn format_matches<T: Element>(format: &str) -> bool {
    let Some(code) = native_code(format) else {
        return false;
    };
    if T::ACCEPTED.contains(&code) {
        return true;
    }
    // `l`/`L` 的宽度随平台变化，按 C `long` 的实际宽度匹配。
    match code {
        'l' => (LONG_IS_64 && T::FORMAT == "q") || (!LONG_IS_64 && T::FORMAT == "i"),
        'L' => (LONG_IS_64 && T::FORMAT == "Q") || (!LONG_IS_64 && T::FORMAT == "I"),
        _ => false,
    }
}

/// 剥离字节序前缀后返回唯一的格式码；多字符或非本机字节序返回 `None`。
fn native_code(format: &str) -> Option<char> {
    let mut chars = format.chars();
    let first = chars.next()?;
    let code = match first {
        '@' | '=' => chars.next()?,
        '<' if cfg!(target_endian = "little") => chars.next()?,
        '>' | '!' if cfg!(target_endian = "big") => chars.next()?,
        '<' | '>' | '!' => return None,
        other => other,
    };
    if chars.next().is_some() {
        return None;
    }
    Some(code)
}
