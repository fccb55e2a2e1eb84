//! # 路由事件与导航参数
//!
//! ## 核心意图（Why）
//! - 路由器命中一次模式后交付 [`RouteMatchedEvent`]，绑定器消费一次即丢弃；
//! - 事件携带的导航信息被归一化为 [`NavigationParameters`]：所有可识别字段逐一列出并带默认值，
//!   在一个绑定周期内单向传递，从不持久化。
//!
//! ## 契约（What）
//! - [`TargetInformation`] 是页面初始化时确定的静态描述，之后只读；
//! - [`RouteArguments`] 保留命中参数与可选的查询参数包（`?query`）。

use std::collections::BTreeMap;
use std::fmt;

use futures::future::BoxFuture;
use serde::Deserialize;

use crate::data::ContextRef;
use crate::error::DataError;

/// 异步产出上下文的 Future，例如“先在后台创建对象，再导航进去”。
pub type AsyncContext = BoxFuture<'static, Result<ContextRef, DataError>>;

/// 触发本次导航的原因。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum NavigationReason {
    /// 未归类的导航（直接输入 URL、书签等）。
    #[default]
    Other,
    /// 在表格中点击行。
    RowPress,
    /// 恢复保存的应用状态；此时不应触发原地刷新。
    AppStateChanged,
    /// 编辑流程内部的导航（进入编辑、切换草稿等）。
    EditFlowAction,
}

/// 页面的静态目标描述。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `context_pattern`：带 `{key}` 占位符的绑定路径模板；缺省时使用路由自身的模式；
///   - `target_name`：与路由信息中的 `targets` 比对，判断本页是否为当前路由的目标；
///   - `view_level`/`route_level`/`fcl_level`：页面在导航层级与多列布局中的位置。
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct TargetInformation {
    pub context_pattern: Option<String>,
    pub target_name: String,
    pub view_level: u32,
    pub route_level: u32,
    pub fcl_level: u32,
}

impl TargetInformation {
    /// 以目标名与上下文模式构造描述，层级全部为 0。
    pub fn new(target_name: impl Into<String>, context_pattern: impl Into<String>) -> Self {
        Self {
            context_pattern: Some(context_pattern.into()),
            target_name: target_name.into(),
            ..Self::default()
        }
    }

    /// 设置视图层级。
    pub fn with_view_level(mut self, view_level: u32) -> Self {
        self.view_level = view_level;
        self
    }
}

/// 路由命中参数。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RouteArguments {
    values: BTreeMap<String, String>,
    query: Option<BTreeMap<String, String>>,
}

impl RouteArguments {
    /// 创建空参数集合。
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个命中参数。
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// 追加一个查询参数。
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// 按键名顺序遍历命中参数。
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 查询参数包。
    pub fn query(&self) -> Option<&BTreeMap<String, String>> {
        self.query.as_ref()
    }
}

/// 路由器附带的路由信息。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RouteInformation {
    /// 当前路由命中的目标名列表。
    pub targets: Vec<String>,
    /// 当前路由的层级。
    pub route_level: u32,
}

impl RouteInformation {
    /// 以目标名列表构造。
    pub fn new<I, S>(targets: I, route_level: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            route_level,
        }
    }
}

/// 路由器随事件交付的导航信息。
#[derive(Default)]
pub struct NavigationInfo {
    /// 已解析好的上下文（例如从列表行传入），路径一致时优先复用。
    pub use_context: Option<ContextRef>,
    /// 异步产出上下文的 Future。
    pub async_context: Option<AsyncContext>,
    pub reason: NavigationReason,
    pub editable: bool,
    pub persist_scroll: bool,
    pub draft_navigation: bool,
    pub show_placeholder: bool,
    pub fcl_level_delta: i32,
    /// 由目标页负责创建对象（显式延迟创建）。
    pub deferred_context: bool,
}

impl fmt::Debug for NavigationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationInfo")
            .field("use_context", &self.use_context.as_ref().map(|c| c.path()))
            .field("async_context", &self.async_context.is_some())
            .field("reason", &self.reason)
            .field("editable", &self.editable)
            .field("deferred_context", &self.deferred_context)
            .finish_non_exhaustive()
    }
}

/// 一个绑定周期内传递的导航参数。
///
/// # 教案式说明
/// - **意图 (Why)**：把动态的、可选字段繁多的参数包收敛为一个字段齐全、带默认值的结构体；
/// - **契约 (What)**：`target_editable` 与 `action_create` 既可能来自路由器，也可能由
///   [`build_path`](crate::path::build_path) 写入；其余字段只读；
/// - **风险 (Trade-offs)**：`async_context` 只能被消费一次，绑定器在决策完成后将其取走。
#[derive(Default)]
pub struct NavigationParameters {
    pub target_editable: bool,
    pub action_create: bool,
    pub persist_scroll: bool,
    pub draft_navigation: bool,
    pub show_placeholder: bool,
    pub fcl_level_delta: i32,
    pub reason: NavigationReason,
    pub deferred_context: bool,
    pub use_context: Option<ContextRef>,
    pub async_context: Option<AsyncContext>,
}

impl NavigationParameters {
    /// 以导航原因构造参数，其余字段取默认值。
    pub fn with_reason(reason: NavigationReason) -> Self {
        Self {
            reason,
            ..Self::default()
        }
    }
}

impl From<NavigationInfo> for NavigationParameters {
    fn from(info: NavigationInfo) -> Self {
        Self {
            target_editable: info.editable,
            action_create: false,
            persist_scroll: info.persist_scroll,
            draft_navigation: info.draft_navigation,
            show_placeholder: info.show_placeholder,
            fcl_level_delta: info.fcl_level_delta,
            reason: info.reason,
            deferred_context: info.deferred_context,
            use_context: info.use_context,
            async_context: info.async_context,
        }
    }
}

impl fmt::Debug for NavigationParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationParameters")
            .field("target_editable", &self.target_editable)
            .field("action_create", &self.action_create)
            .field("persist_scroll", &self.persist_scroll)
            .field("draft_navigation", &self.draft_navigation)
            .field("show_placeholder", &self.show_placeholder)
            .field("fcl_level_delta", &self.fcl_level_delta)
            .field("reason", &self.reason)
            .field("deferred_context", &self.deferred_context)
            .field("use_context", &self.use_context.as_ref().map(|c| c.path()))
            .field("async_context", &self.async_context.is_some())
            .finish()
    }
}

/// 路由命中事件。
#[derive(Debug)]
pub struct RouteMatchedEvent {
    pub route_pattern: String,
    pub arguments: RouteArguments,
    pub navigation_info: NavigationInfo,
    pub route_information: RouteInformation,
}

impl RouteMatchedEvent {
    /// 以路由模式与命中参数构造事件，导航信息与路由信息取默认值。
    pub fn new(route_pattern: impl Into<String>, arguments: RouteArguments) -> Self {
        Self {
            route_pattern: route_pattern.into(),
            arguments,
            navigation_info: NavigationInfo::default(),
            route_information: RouteInformation::default(),
        }
    }

    /// 设置导航信息。
    pub fn with_navigation_info(mut self, navigation_info: NavigationInfo) -> Self {
        self.navigation_info = navigation_info;
        self
    }

    /// 设置路由信息。
    pub fn with_route_information(mut self, route_information: RouteInformation) -> Self {
        self.route_information = route_information;
        self
    }
}
