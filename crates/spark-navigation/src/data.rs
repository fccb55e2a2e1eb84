//! # 数据访问协作方契约
//!
//! ## 核心意图（Why）
//! - 引擎不实现数据层，只声明它需要的最小能力：按路径绑定上下文、keep-alive 上下文的获取与释放、
//!   依赖绑定内省、批量副作用请求、未保存修改检测与重置、集合查询；
//! - 宿主注入 [`DataModel`] 的具体实现；测试使用内存实现。
//!
//! ## 架构定位（Where）
//! - [`ContextRef`] 在页面、列与数据层之间共享；“是否同一个上下文”一律按实例身份
//!   （[`same_context`]）判断，而不是按路径。
//! - [`Binding`] 把“对象/列表/属性绑定”的运行时类型判断收敛为可穷举匹配的枚举。

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::DataError;
use crate::filter::Filter;

/// 共享的上下文引用。
pub type ContextRef = Arc<dyn DataContext>;

/// keep-alive 上下文被数据层真正销毁前调用的回调。
pub type BeforeDestroy = Box<dyn Fn() + Send + Sync>;

/// 草稿状态标志属性。
pub const DRAFT_STATE_PROPERTIES: [&str; 3] = ["HasActiveEntity", "HasDraftEntity", "IsActiveEntity"];
/// 草稿根实体的管理元数据导航。
pub const DRAFT_ADMINISTRATIVE_DATA: &str = "DraftAdministrativeData";
/// 用于判断草稿标志是否已在本地缓存中的属性。
pub const ACTIVE_ENTITY_PROPERTY: &str = "IsActiveEntity";

/// 判断两个引用是否指向同一个上下文实例。
pub fn same_context(left: &ContextRef, right: &ContextRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(left), Arc::as_ptr(right))
}

/// 上下文所属的父绑定类型。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ParentBinding {
    /// 没有父绑定（例如游离的上下文）。
    None,
    /// 属于某个列表绑定（表格行）。
    List,
    /// 属于某个对象（上下文）绑定。
    Context,
}

/// 实体的草稿类型。
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
pub enum DraftKind {
    Root,
    Node,
}

/// 引擎关心的实体级元数据。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `draft`：草稿根/草稿节点标记，缺省表示未启用草稿；
///   - `semantic_keys`：有序的语义键属性名；
///   - `messages_path`：消息集合属性路径；
///   - `delete_restriction_path`/`update_restriction_path`：删除/更新前置条件属性；
///   - `request_at_least`：展示变体要求至少请求的属性。
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct EntityMetadata {
    pub draft: Option<DraftKind>,
    pub semantic_keys: Vec<String>,
    pub messages_path: Option<String>,
    pub delete_restriction_path: Option<String>,
    pub update_restriction_path: Option<String>,
    pub request_at_least: Vec<String>,
}

impl EntityMetadata {
    /// 是否启用了草稿（根或节点）。
    pub fn is_draft_enabled(&self) -> bool {
        self.draft.is_some()
    }

    /// 需要强制刷新的草稿相关路径；草稿根额外包含管理元数据。
    pub fn draft_refresh_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = match self.draft {
            None => return Vec::new(),
            Some(_) => DRAFT_STATE_PROPERTIES.iter().map(|p| (*p).to_owned()).collect(),
        };
        if self.draft == Some(DraftKind::Root) {
            paths.push(DRAFT_ADMINISTRATIVE_DATA.to_owned());
        }
        paths
    }
}

/// 依赖绑定树中的节点。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Binding {
    /// 对象绑定，可继续挂载依赖绑定。
    Object(ObjectBinding),
    /// 列表绑定。
    List(ListBinding),
    /// 标量属性绑定。
    Property(PropertyBinding),
}

impl Binding {
    /// 构造对象绑定。
    pub fn object(path: impl Into<String>, dependents: Vec<Binding>) -> Self {
        Binding::Object(ObjectBinding {
            path: path.into(),
            dependents,
        })
    }

    /// 构造列表绑定。
    pub fn list(path: impl Into<String>) -> Self {
        Binding::List(ListBinding { path: path.into() })
    }

    /// 构造属性绑定。
    pub fn property(path: impl Into<String>) -> Self {
        Binding::Property(PropertyBinding { path: path.into() })
    }
}

/// 对象绑定：相对路径与其依赖绑定。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectBinding {
    pub path: String,
    pub dependents: Vec<Binding>,
}

/// 列表绑定的相对路径。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListBinding {
    pub path: String,
}

/// 属性绑定的相对路径。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PropertyBinding {
    pub path: String,
}

/// 新建（非 keep-alive）上下文时的绑定参数。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ContextParameters {
    pub group_id: String,
    pub update_group_id: String,
    pub patch_without_side_effects: bool,
    /// 需要随上下文一并请求的属性。
    pub select: Vec<String>,
}

/// 集合查询。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectionQuery {
    /// 集合路径，例如 `/Orders`。
    pub collection: String,
    pub filter: Filter,
    /// 最多返回的匹配数。
    pub top: usize,
    pub group_id: String,
}

/// 数据层提供的绑定上下文。
///
/// # 教案式说明
/// - **意图 (Why)**：页面与列只通过该契约读写上下文，keep-alive 标志的真实持有者是数据层；
/// - **契约 (What)**：
///   - `refresh`/`request_properties` 为“触发即返回”，由数据层自行调度请求；
///   - `request_side_effects` 是唯一需要等待完成的操作；
///   - `set_keep_alive` 可能被数据层拒绝（例如父列表绑定未开启独立请求），以 [`DataError`] 返回；
///   - `release_binding` 重置该上下文所属隐藏绑定的修改并销毁绑定。
#[async_trait]
pub trait DataContext: Send + Sync + fmt::Debug {
    /// 上下文的绝对路径。
    fn path(&self) -> String;

    /// 所属父绑定的类型。
    fn parent_binding(&self) -> ParentBinding;

    /// 当前是否处于 keep-alive 状态。
    fn is_keep_alive(&self) -> bool;

    /// 设置或清除 keep-alive。
    fn set_keep_alive(
        &self,
        keep_alive: bool,
        on_before_destroy: Option<BeforeDestroy>,
        request_messages: bool,
    ) -> Result<(), DataError>;

    /// 是否存在未保存的本地修改。
    fn has_pending_changes(&self) -> bool;

    /// 丢弃未保存的本地修改。
    fn reset_changes(&self);

    /// 属性是否已在本地缓存中。
    fn is_property_loaded(&self, property: &str) -> bool;

    /// 触发加载指定属性。
    fn request_properties(&self, properties: &[&str]);

    /// 触发重新加载（不等待完成）。
    fn refresh(&self);

    /// 释放该上下文所属的隐藏绑定。
    fn release_binding(&self);

    /// 以该上下文为根的依赖绑定。
    fn dependent_bindings(&self) -> Vec<Binding>;

    /// 批量请求副作用刷新。
    async fn request_side_effects(&self, paths: Vec<String>) -> Result<(), DataError>;
}

/// 数据访问协作方。
#[async_trait]
pub trait DataModel: Send + Sync {
    /// 按元数据路径（见 [`meta_path`](crate::path::meta_path)）读取实体元数据。
    fn entity_metadata(&self, meta_path: &str) -> Option<EntityMetadata>;

    /// 文本过滤是否区分大小写（模型级设置）。
    fn is_filtering_case_sensitive(&self) -> bool {
        true
    }

    /// 以路径创建隐藏的上下文绑定，返回其绑定上下文。
    fn bind_context(
        &self,
        path: &str,
        parameters: &ContextParameters,
    ) -> Result<ContextRef, DataError>;

    /// 获取（必要时创建）集合成员路径上的 keep-alive 上下文。
    fn keep_alive_context(
        &self,
        member_path: &str,
        request_messages: bool,
    ) -> Result<ContextRef, DataError>;

    /// 以 `parent` 为基准绑定相对路径。
    fn bind_relative_context(
        &self,
        parent: &ContextRef,
        relative_path: &str,
    ) -> Result<ContextRef, DataError>;

    /// 执行集合查询，返回匹配上下文的技术路径。
    async fn request_contexts(&self, query: &CollectionQuery) -> Result<Vec<String>, DataError>;
}
