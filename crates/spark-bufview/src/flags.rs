//! 缓冲能力标志。
//!
//! # 模块定位（Why）
//! - 消费方通过一组可组合的能力标志告诉导出方“我能处理什么形态的缓冲”，导出方据此决定填充哪些描述符字段；
//! - 标志的数值必须与被包装运行时（CPython `PyBUF_*`）逐位一致，否则跨边界传递的请求会被误读，
//!   因此所有常量直接写出十六进制字面量，并由 [`COMPOSITES`] 表与测试共同约束组合关系。
//!
//! # 设计概要（How）
//! - [`BufferFlags`] 是 `i32` 新类型，只提供查表与位运算，不允许运行期扩展；
//! - 组合标志在 [`COMPOSITES`] 中登记其组成成员，任何组合值都必须等于成员按位或的结果；
//! - 蕴含关系（`STRIDES ⇒ ND`、`INDIRECT ⇒ STRIDES` 等）通过 `requires_*` 查询统一表达。

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use crate::error::{BufferError, Result};

/// 遍历顺序约束，对应 `C_CONTIGUOUS` / `F_CONTIGUOUS` / `ANY_CONTIGUOUS`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Contiguity {
    /// 行优先：最后一维变化最快。
    C,
    /// 列优先：第一维变化最快。
    Fortran,
    /// C 或 Fortran 任一即可。
    Any,
}

/// 缓冲能力标志位集合。
///
/// # 契约说明（What）
/// - 数值与 CPython `PyBUF_*` 完全一致，可直接作为 `c_int` 传过 FFI 边界；
/// - `SIMPLE`（0）表示只需要一段连续字节，格式隐含为无符号字节 `"B"`；
/// - 组合常量是固定的按位或结果，见 [`COMPOSITES`]。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferFlags(i32);

const ND_BIT: i32 = 0x0008;
const STRIDES_BIT: i32 = 0x0010;
const C_CONTIGUOUS_BIT: i32 = 0x0020;
const F_CONTIGUOUS_BIT: i32 = 0x0040;
const ANY_CONTIGUOUS_BIT: i32 = 0x0080;
const INDIRECT_BIT: i32 = 0x0100;

/// 会引出 `shape` 字段的全部比特。
const SHAPE_BITS: i32 =
    ND_BIT | STRIDES_BIT | C_CONTIGUOUS_BIT | F_CONTIGUOUS_BIT | ANY_CONTIGUOUS_BIT | INDIRECT_BIT;
/// 会引出 `strides` 字段的全部比特。
const STRIDE_BITS: i32 =
    STRIDES_BIT | C_CONTIGUOUS_BIT | F_CONTIGUOUS_BIT | ANY_CONTIGUOUS_BIT | INDIRECT_BIT;

impl BufferFlags {
    /// 默认请求：仅字节，无 shape/strides/format。
    pub const SIMPLE: Self = Self(0x0000);
    /// 返回的缓冲必须可写。
    pub const WRITABLE: Self = Self(0x0001);
    /// 旧拼写，保留以兼容沿用 `PyBUF_WRITEABLE` 的调用方。
    pub const WRITEABLE: Self = Self::WRITABLE;
    /// 必须提供真实的格式字符串。
    pub const FORMAT: Self = Self(0x0004);
    /// 必须提供 shape，布局按 C 连续处理。
    pub const ND: Self = Self(0x0008);
    /// 必须提供 strides；蕴含 `ND`。
    pub const STRIDES: Self = Self(0x0018);
    /// 必须为 C 连续；蕴含 `STRIDES`。
    pub const C_CONTIGUOUS: Self = Self(0x0038);
    /// 必须为 Fortran 连续；蕴含 `STRIDES`。
    pub const F_CONTIGUOUS: Self = Self(0x0058);
    /// C 或 Fortran 连续之一；蕴含 `STRIDES`。
    pub const ANY_CONTIGUOUS: Self = Self(0x0098);
    /// 必须提供 suboffsets（可为空）；蕴含 `STRIDES`。
    pub const INDIRECT: Self = Self(0x0118);

    pub const CONTIG: Self = Self(0x0009);
    pub const CONTIG_RO: Self = Self(0x0008);
    pub const STRIDED: Self = Self(0x0019);
    pub const STRIDED_RO: Self = Self(0x0018);
    pub const RECORDS: Self = Self(0x001D);
    pub const RECORDS_RO: Self = Self(0x001C);
    pub const FULL: Self = Self(0x011D);
    pub const FULL_RO: Self = Self(0x011C);

    /// 所有已定义比特的并集。
    pub const DEFINED_MASK: i32 = 0x0001
        | 0x0004
        | ND_BIT
        | STRIDES_BIT
        | C_CONTIGUOUS_BIT
        | F_CONTIGUOUS_BIT
        | ANY_CONTIGUOUS_BIT
        | INDIRECT_BIT;

    /// 返回原始比特值，可直接作为 `c_int` 传给导出方。
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// 从原始比特构造标志，拒绝未定义的比特。
    ///
    /// # 契约说明（What）
    /// - **输入**：任意 `i32`，通常来自 FFI 或配置；
    /// - **返回**：全部比特均已定义时返回 `Ok`；否则返回 [`BufferError::UnknownFlags`]；
    /// - **后置条件**：不会自动补齐蕴含比特，`requires_*` 查询自行处理蕴含关系。
    pub fn from_bits(bits: i32) -> Result<Self> {
        if bits & !Self::DEFINED_MASK != 0 {
            return Err(BufferError::UnknownFlags { bits });
        }
        Ok(Self(bits))
    }

    /// `other` 的全部比特是否都已包含。
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// 是否与 `other` 有任意公共比特。
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// 按位或，`const` 上下文可用。
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_simple(self) -> bool {
        self.0 == 0
    }

    pub const fn requires_writable(self) -> bool {
        self.0 & Self::WRITABLE.0 != 0
    }

    pub const fn requires_format(self) -> bool {
        self.0 & Self::FORMAT.0 != 0
    }

    /// 是否需要 shape；任何蕴含 `ND` 的比特都会引出 shape。
    pub const fn requires_shape(self) -> bool {
        self.0 & SHAPE_BITS != 0
    }

    /// 是否需要 strides；`STRIDES`、三种连续性与 `INDIRECT` 均蕴含该要求。
    pub const fn requires_strides(self) -> bool {
        self.0 & STRIDE_BITS != 0
    }

    pub const fn requires_suboffsets(self) -> bool {
        self.0 & INDIRECT_BIT != 0
    }

    /// 请求中携带的连续性约束；同时出现多个时按 C、Fortran、Any 的顺序取第一个。
    pub const fn contiguity(self) -> Option<Contiguity> {
        if self.0 & C_CONTIGUOUS_BIT != 0 {
            Some(Contiguity::C)
        } else if self.0 & F_CONTIGUOUS_BIT != 0 {
            Some(Contiguity::Fortran)
        } else if self.0 & ANY_CONTIGUOUS_BIT != 0 {
            Some(Contiguity::Any)
        } else {
            None
        }
    }

    /// 按名称查表（大小写不敏感，可带 `PyBUF_` 前缀）。
    pub fn by_name(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        let bare = trimmed
            .strip_prefix("PyBUF_")
            .or_else(|| trimmed.strip_prefix("pybuf_"))
            .unwrap_or(trimmed);
        COMPOSITES
            .iter()
            .find(|def| def.name.eq_ignore_ascii_case(bare))
            .map(|def| def.value)
    }
}

impl BitOr for BufferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for BufferFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for BufferFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferFlags({self} = {:#06x})", self.0)
    }
}

impl fmt::Display for BufferFlags {
    /// 以名称拼接输出，例如 `WRITABLE | FORMAT | STRIDES`。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_simple() {
            return f.write_str("SIMPLE");
        }
        let mut parts: Vec<&'static str> = Vec::new();
        if self.requires_writable() {
            parts.push("WRITABLE");
        }
        if self.requires_format() {
            parts.push("FORMAT");
        }
        let structural = [
            (C_CONTIGUOUS_BIT, "C_CONTIGUOUS"),
            (F_CONTIGUOUS_BIT, "F_CONTIGUOUS"),
            (ANY_CONTIGUOUS_BIT, "ANY_CONTIGUOUS"),
            (INDIRECT_BIT, "INDIRECT"),
        ];
        let before = parts.len();
        for (bit, name) in structural {
            if self.0 & bit != 0 {
                parts.push(name);
            }
        }
        if parts.len() == before {
            if self.0 & STRIDES_BIT != 0 {
                parts.push("STRIDES");
            } else if self.0 & ND_BIT != 0 {
                parts.push("ND");
            }
        }
        f.write_str(&parts.join(" | "))
    }
}

/// 标志表中的一项。
///
/// - `constituents` 为空表示原子标志；非空表示组合标志，其值必须等于成员按位或；
/// - `implies` 记录语义上的蕴含关系，值必须包含每个被蕴含标志的全部比特。
#[derive(Debug)]
pub struct FlagDefinition {
    pub name: &'static str,
    pub value: BufferFlags,
    pub constituents: &'static [BufferFlags],
    pub implies: &'static [BufferFlags],
    pub description: &'static str,
}

impl FlagDefinition {
    pub fn is_composite(&self) -> bool {
        !self.constituents.is_empty()
    }

    /// 成员按位或的结果；原子标志返回自身。
    pub fn constituents_union(&self) -> BufferFlags {
        if self.constituents.is_empty() {
            return self.value;
        }
        self.constituents
            .iter()
            .fold(BufferFlags::SIMPLE, |acc, flag| acc | *flag)
    }
}

/// 权威标志表。
pub static COMPOSITES: &[FlagDefinition] = &[
    FlagDefinition {
        name: "SIMPLE",
        value: BufferFlags::SIMPLE,
        constituents: &[],
        implies: &[],
        description: "bytes only; no shape, strides or format",
    },
    FlagDefinition {
        name: "WRITABLE",
        value: BufferFlags::WRITABLE,
        constituents: &[],
        implies: &[],
        description: "require mutable memory",
    },
    FlagDefinition {
        name: "WRITEABLE",
        value: BufferFlags::WRITEABLE,
        constituents: &[],
        implies: &[],
        description: "legacy spelling of WRITABLE",
    },
    FlagDefinition {
        name: "FORMAT",
        value: BufferFlags::FORMAT,
        constituents: &[],
        implies: &[],
        description: "require a true format string; absent means unsigned bytes",
    },
    FlagDefinition {
        name: "ND",
        value: BufferFlags::ND,
        constituents: &[],
        implies: &[],
        description: "require shape; C-contiguous layout assumed",
    },
    FlagDefinition {
        name: "STRIDES",
        value: BufferFlags::STRIDES,
        constituents: &[],
        implies: &[BufferFlags::ND],
        description: "require strides",
    },
    FlagDefinition {
        name: "C_CONTIGUOUS",
        value: BufferFlags::C_CONTIGUOUS,
        constituents: &[],
        implies: &[BufferFlags::STRIDES],
        description: "guarantee C-order contiguity",
    },
    FlagDefinition {
        name: "F_CONTIGUOUS",
        value: BufferFlags::F_CONTIGUOUS,
        constituents: &[],
        implies: &[BufferFlags::STRIDES],
        description: "guarantee Fortran-order contiguity",
    },
    FlagDefinition {
        name: "ANY_CONTIGUOUS",
        value: BufferFlags::ANY_CONTIGUOUS,
        constituents: &[],
        implies: &[BufferFlags::STRIDES],
        description: "guarantee C or Fortran contiguity",
    },
    FlagDefinition {
        name: "INDIRECT",
        value: BufferFlags::INDIRECT,
        constituents: &[],
        implies: &[BufferFlags::STRIDES],
        description: "require suboffsets, which may be empty",
    },
    FlagDefinition {
        name: "STRIDED",
        value: BufferFlags::STRIDED,
        constituents: &[BufferFlags::STRIDES, BufferFlags::WRITABLE],
        implies: &[BufferFlags::ND],
        description: "STRIDES | WRITABLE",
    },
    FlagDefinition {
        name: "STRIDED_RO",
        value: BufferFlags::STRIDED_RO,
        constituents: &[BufferFlags::STRIDES],
        implies: &[BufferFlags::ND],
        description: "STRIDES",
    },
    FlagDefinition {
        name: "RECORDS",
        value: BufferFlags::RECORDS,
        constituents: &[
            BufferFlags::STRIDES,
            BufferFlags::FORMAT,
            BufferFlags::WRITABLE,
        ],
        implies: &[BufferFlags::ND],
        description: "STRIDES | FORMAT | WRITABLE",
    },
    FlagDefinition {
        name: "RECORDS_RO",
        value: BufferFlags::RECORDS_RO,
        constituents: &[BufferFlags::STRIDES, BufferFlags::FORMAT],
        implies: &[BufferFlags::ND],
        description: "STRIDES | FORMAT",
    },
    FlagDefinition {
        name: "FULL",
        value: BufferFlags::FULL,
        constituents: &[
            BufferFlags::INDIRECT,
            BufferFlags::FORMAT,
            BufferFlags::WRITABLE,
        ],
        implies: &[BufferFlags::STRIDES, BufferFlags::ND],
        description: "INDIRECT | FORMAT | WRITABLE",
    },
    FlagDefinition {
        name: "FULL_RO",
        value: BufferFlags::FULL_RO,
        constituents: &[BufferFlags::INDIRECT, BufferFlags::FORMAT],
        implies: &[BufferFlags::STRIDES, BufferFlags::ND],
        description: "INDIRECT | FORMAT",
    },
    FlagDefinition {
        name: "CONTIG",
        value: BufferFlags::CONTIG,
        constituents: &[BufferFlags::ND, BufferFlags::WRITABLE],
        implies: &[],
        description: "ND | WRITABLE",
    },
    FlagDefinition {
        name: "CONTIG_RO",
        value: BufferFlags::CONTIG_RO,
        constituents: &[BufferFlags::ND],
        implies: &[],
        description: "ND",
    },
];
