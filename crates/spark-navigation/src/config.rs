//! # 引擎配置
//!
//! ## 核心意图（Why）
//! - 把绑定周期中的常量（查询分组、语义查询页大小）与策略开关（复用上下文前是否丢弃未保存修改）
//!   集中在一个可反序列化的结构体中，宿主可以用 TOML 下发；
//! - 所有字段都有默认值，空文档等价于 [`EngineSettings::default`]。
//!
//! ## 文档示例（How）
//! ```toml
//! [semantic]
//! lookup_page_size = 2
//!
//! [pending_changes]
//! discard_when_collaborative = true
//! discard_when_disconnected = false
//! ```

use serde::Deserialize;

use crate::error::BindingError;

/// 导航绑定引擎的完整配置。
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// 语义路径解析相关配置。
    pub semantic: SemanticSettings,
    /// 新建上下文时附带的绑定参数。
    pub binding: BindingSettings,
    /// 复用上下文前对未保存修改的处置策略。
    pub pending_changes: PendingChangesPolicy,
}

impl EngineSettings {
    /// 从 TOML 文本解析配置。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：未出现的键取默认值；未知键、类型错误或 `lookup_page_size == 0`
    ///   都返回 [`BindingError::Configuration`]；
    /// - **执行 (How)**：先交给 `toml` 反序列化，再执行取值校验。
    pub fn from_toml_str(source: &str) -> Result<Self, BindingError> {
        let settings: EngineSettings =
            toml::from_str(source).map_err(|err| BindingError::Configuration {
                detail: err.to_string(),
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), BindingError> {
        if self.semantic.lookup_page_size == 0 {
            return Err(BindingError::Configuration {
                detail: "semantic.lookup_page_size must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// 语义路径查询配置。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SemanticSettings {
    /// 语义查询最多请求的匹配数。取 2 而不是 1，以便观察到重复匹配而不过量拉取。
    pub lookup_page_size: usize,
    /// 语义查询使用的请求分组。
    pub group_id: String,
}

impl Default for SemanticSettings {
    fn default() -> Self {
        Self {
            lookup_page_size: 2,
            group_id: "$auto.Heroes".to_owned(),
        }
    }
}

/// 新建（非 keep-alive）上下文时的绑定参数。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BindingSettings {
    /// 读取分组。
    pub group_id: String,
    /// 更新分组。
    pub update_group_id: String,
    /// PATCH 请求是否跳过隐式副作用。
    pub patch_without_side_effects: bool,
}

impl Default for BindingSettings {
    fn default() -> Self {
        Self {
            group_id: "$auto.Heroes".to_owned(),
            update_group_id: "$auto".to_owned(),
            patch_without_side_effects: true,
        }
    }
}

/// 复用列表行上下文时，是否先丢弃其未保存修改。
///
/// # 教案式说明
/// - **意图 (Why)**：多列布局下点击表格行会刷新被复用的上下文；若该上下文带有未保存修改，
///   刷新会失败或覆盖用户输入。丢弃与否属于启发式规则，因此做成可配置开关；
/// - **契约 (What)**：任一条件成立即丢弃；两者都关闭时永远保留未保存修改（此时也不会刷新）。
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PendingChangesPolicy {
    /// 协同草稿编辑处于激活状态时丢弃。
    pub discard_when_collaborative: bool,
    /// 当前视图尚未挂接到界面时丢弃。
    pub discard_when_disconnected: bool,
}

impl Default for PendingChangesPolicy {
    fn default() -> Self {
        Self {
            discard_when_collaborative: true,
            discard_when_disconnected: true,
        }
    }
}

impl PendingChangesPolicy {
    /// 根据运行时事实判断是否应丢弃未保存修改。
    pub fn should_discard(&self, collaboration_active: bool, view_connected: bool) -> bool {
        (self.discard_when_collaborative && collaboration_active)
            || (self.discard_when_disconnected && !view_connected)
    }
}
