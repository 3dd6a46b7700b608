//! 协商策略配置。
//!
//! 策略以 TOML 描述，字段名与 [`NegotiationPolicy`] 一一对应：
//!
//! ```toml
//! default_flags = ["CONTIG_RO", "FORMAT"]
//! verify_descriptors = true
//! ```
//!
//! 标志名按 [`BufferFlags::by_name`] 解析（大小写不敏感，可带 `PyBUF_` 前缀），多个名称按位或。

use serde::{Deserialize, Serialize};

use crate::error::{BufferError, Result};
use crate::flags::BufferFlags;

/// [`crate::negotiation::Negotiator`] 使用的策略。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NegotiationPolicy {
    /// 未显式给出标志时使用的标志名列表；空列表等价于 `SIMPLE`。
    pub default_flags: Vec<String>,
    /// 是否在构造视图前校验导出方的应答。
    pub verify_descriptors: bool,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            default_flags: vec!["SIMPLE".to_owned()],
            verify_descriptors: true,
        }
    }
}

impl NegotiationPolicy {
    /// 从 TOML 文本解析策略，缺省字段取默认值。
    ///
    /// # Errors
    /// 语法错误或出现未知字段时返回 [`BufferError::Config`]。
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|err| BufferError::Config {
            detail: err.to_string(),
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|err| BufferError::Config {
            detail: err.to_string(),
        })
    }

    /// 把标志名列表解析为按位或后的 [`BufferFlags`]。
    ///
    /// # Errors
    /// 任一名称不在标志表中时返回 [`BufferError::Config`]。
    pub fn default_flags(&self) -> Result<BufferFlags> {
        self.default_flags
            .iter()
            .try_fold(BufferFlags::SIMPLE, |acc, name| {
                BufferFlags::by_name(name)
                    .map(|flag| acc | flag)
                    .ok_or_else(|| BufferError::Config {
                        detail: format!("unknown buffer flag `{name}`"),
                    })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let policy = NegotiationPolicy::from_toml_str("verify_descriptors = false").unwrap();
        assert_eq!(policy.default_flags, vec!["SIMPLE".to_owned()]);
        assert!(!policy.verify_descriptors);
        assert_eq!(policy.default_flags().unwrap(), BufferFlags::SIMPLE);
    }

    #[test]
    fn names_are_or_ed() {
        let policy =
            NegotiationPolicy::from_toml_str(r#"default_flags = ["PyBUF_ND", "format", "WRITABLE"]"#)
                .unwrap();
        assert_eq!(
            policy.default_flags().unwrap(),
            BufferFlags::ND | BufferFlags::FORMAT | BufferFlags::WRITABLE
        );
    }

    #[test]
    fn unknown_names_and_fields_are_config_errors() {
        let policy = NegotiationPolicy {
            default_flags: vec!["CONTIGUOUS".to_owned()],
            verify_descriptors: true,
        };
        assert!(matches!(policy.default_flags(), Err(BufferError::Config { .. })));
        assert!(matches!(
            NegotiationPolicy::from_toml_str("strict = true"),
            Err(BufferError::Config { .. })
        ));
    }

    #[test]
    fn policy_round_trips_through_toml() {
        let policy = NegotiationPolicy {
            default_flags: vec!["STRIDED_RO".to_owned()],
            verify_descriptors: false,
        };
        let text = policy.to_toml_string().unwrap();
        assert_eq!(NegotiationPolicy::from_toml_str(&text).unwrap(), policy);
    }
}
