//! # 绑定器协作方契约
//!
//! ## 核心意图（Why）
//! - 绑定器只做决策，真正的视图挂接、多列布局、路由跳转、错误页展示都由宿主实现；
//! - 除 [`PageHost`] 外，每个协作方都提供一个“什么也不做”或“只记日志”的默认实现，
//!   单列页面无需关心多列布局与路由同步。
//!
//! ## 契约（What）
//! - 所有回调都是同步的；绑定器在调用它们时不持有内部锁，回调可以安全地重入
//!   [`ContextBinder::bound_context`](super::ContextBinder::bound_context)。

use tracing::error;

use crate::data::ContextRef;
use crate::navigation::NavigationReason;

/// 生命周期钩子收到的参数。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BindingHookParameters {
    /// 目标页需要以可编辑状态渲染。
    pub editable: bool,
    pub reason: NavigationReason,
    pub draft_navigation: bool,
    pub show_placeholder: bool,
}

/// 页面级扩展钩子，全部默认为空实现。
pub trait PageExtension: Send + Sync {
    /// 绑定上下文切换之前调用；`None` 表示即将解除绑定。
    fn on_before_binding(&self, _context: Option<&ContextRef>, _parameters: &BindingHookParameters) {}

    /// 绑定上下文切换之后调用。
    fn on_after_binding(&self, _context: Option<&ContextRef>, _parameters: &BindingHookParameters) {}

    /// 本页处理路由命中事件之前调用。
    fn on_route_matched(&self) {}

    /// 本页处理完路由命中事件之后调用。
    fn on_route_matched_finished(&self) {}
}

/// 不注册任何页面逻辑的扩展。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopExtension;

impl PageExtension for NoopExtension {}

/// 拥有该绑定器的页面（或多列布局中的一列）。
///
/// # 教案式说明
/// - **契约 (What)**：
///   - `apply_binding_context`：把上下文挂接到视图，`None` 表示解除；
///   - `create_deferred_context`：在逻辑位置上物化一个尚未持久化的新对象；
///   - `is_connected`：视图是否已挂接到界面；
///   - `is_edit_state_dirty`：编辑状态是否标记为脏（例如刚从编辑流程返回）；
///   - `is_collaboration_active`：协同草稿编辑是否激活。
pub trait PageHost: Send + Sync {
    fn apply_binding_context(&self, context: Option<&ContextRef>);

    fn create_deferred_context(&self, path: &str, action_create: bool);

    fn is_connected(&self) -> bool {
        true
    }

    fn is_edit_state_dirty(&self) -> bool {
        false
    }

    fn is_collaboration_active(&self) -> bool {
        false
    }
}

/// 多列布局控制器。
pub trait LayoutController: Send + Sync {
    /// 应用是否运行在多列布局中。
    fn is_multi_column(&self) -> bool;

    /// 上下文是否仍被某个可见列使用。
    ///
    /// keep-alive 上下文被销毁时，返回 `true` 才触发 [`LayoutController::navigate_back_from_context`]：
    /// 仍在显示的列失去了数据，必须回退；已不显示的上下文无需处理。
    fn is_context_used_in_pages(&self, context: &ContextRef) -> bool;

    /// 从该上下文“回退”，避免布局中出现空列。
    fn navigate_back_from_context(&self, context: &ContextRef);
}

/// 单列布局：从不保活，也从不回退。
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleColumnLayout;

impl LayoutController for SingleColumnLayout {
    fn is_multi_column(&self) -> bool {
        false
    }

    fn is_context_used_in_pages(&self, _context: &ContextRef) -> bool {
        false
    }

    fn navigate_back_from_context(&self, _context: &ContextRef) {}
}

/// `navigate_to_context` 的选项。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NavigateOptions {
    pub editable: bool,
    pub persist_scroll: bool,
    pub fcl_level_delta: i32,
}

/// 路由器协作方。
pub trait RouterLink: Send + Sync {
    /// 暂停“路由命中同步”，期间的路由命中不再自动重入绑定器。
    fn pause_route_match_synchronization(&self);

    /// 恢复路由命中同步。
    fn resume_route_match_synchronization(&self);

    /// 导航到上下文对应的路由。
    fn navigate_to_context(&self, context: &ContextRef, options: &NavigateOptions);
}

/// 不做任何路由动作的实现，适用于没有异步创建流程的页面。
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedRouter;

impl RouterLink for DetachedRouter {
    fn pause_route_match_synchronization(&self) {}

    fn resume_route_match_synchronization(&self) {}

    fn navigate_to_context(&self, _context: &ContextRef, _options: &NavigateOptions) {}
}

/// 错误页的结构化参数。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ErrorPageParameters {
    pub title: String,
    pub description: String,
    pub fcl_level: u32,
    /// 错误页需要提供“返回外壳”入口。
    pub shell_back: bool,
}

/// 错误页展示协作方。
pub trait ErrorPresenter: Send + Sync {
    fn display_error_page(&self, message: &str, parameters: &ErrorPageParameters);
}

/// 只把错误页请求写入日志的实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingErrorPresenter;

impl ErrorPresenter for LoggingErrorPresenter {
    fn display_error_page(&self, message: &str, parameters: &ErrorPageParameters) {
        error!(
            title = %parameters.title,
            description = %parameters.description,
            fcl_level = parameters.fcl_level,
            "{message}"
        );
    }
}
