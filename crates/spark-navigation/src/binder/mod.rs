//! # ContextBinder：路由命中到绑定上下文的协调状态机
//!
//! ## 核心意图（Why）
//! - 每次路由命中都要回答“本页应当显示哪个实体、如何获得它”：直接绑定、先做语义解析、
//!   延迟到对象创建之后，或复用其他列已经持有的上下文；
//! - 路由与路径都未变化但数据可能过期时，只做副作用刷新而不重建上下文。
//!
//! ## 状态（What）
//! - 每个页面（或多列布局中的一列）：`Unbound → Bound(ctx) → Bound(ctx') | Unbound`，无终态；
//! - 页面同一时刻至多拥有一个活动上下文；多列布局下额外借用数据层持有的 keep-alive 上下文。
//!
//! ## 决策树（How）
//! 1. 空路径：解除绑定并触发钩子；
//! 2. 延迟路径：触发钩子，必要时请宿主物化待创建对象，丢弃当前上下文的未保存修改并解除绑定；
//! 3. 导航携带了路径一致的现成上下文：同一实例则不做任何事，否则（多列布局 + 行点击时先刷新）绑定它；
//! 4. 路径与当前绑定不同：获取或新建上下文并绑定；
//! 5. 路径相同、导航并非“恢复应用状态”、且编辑状态为脏：执行副作用刷新；
//! 6. 其他情况：无事发生。
//!
//! ## 并发约束（Trade-offs）
//! - 内部状态由 `parking_lot::Mutex` 保护，锁从不跨越 `.await`，也不在调用协作方时持有；
//! - 每个路由命中事件领取一个代号；语义解析完成时若已有更新的事件开始，丢弃本次结果
//!   （[`BindOutcome::Superseded`]），避免慢的旧导航覆盖快的新导航。

mod collaborators;
mod error_page;

pub use collaborators::{
    BindingHookParameters, DetachedRouter, ErrorPageParameters, ErrorPresenter, LayoutController,
    LoggingErrorPresenter, NavigateOptions, NoopExtension, PageExtension, PageHost, RouterLink,
    SingleColumnLayout,
};

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::EngineSettings;
use crate::data::{
    ACTIVE_ENTITY_PROPERTY, BeforeDestroy, ContextParameters, ContextRef, DRAFT_STATE_PROPERTIES,
    DataContext, DataModel, EntityMetadata, ParentBinding, same_context,
};
use crate::error::{BindingError, DataError, ErrorClass};
use crate::keep_alive;
use crate::navigation::{
    AsyncContext, NavigationParameters, NavigationReason, RouteInformation, RouteMatchedEvent,
    TargetInformation,
};
use crate::path::{BindingPath, build_path, is_collection_member, meta_path, split_keep_alive_path};
use crate::selection::{SelectionHints, push_unique, select_fields};
use crate::semantic::{SemanticCache, SemanticPathResolver};
use crate::side_effects::SideEffectsRefresher;

/// 一个绑定周期的结果。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BindOutcome {
    /// 本页不是当前路由的目标，事件被忽略。
    Skipped,
    /// 解除了绑定（空路径，或本页位于当前路由之后）。
    Unbound,
    /// 目标对象尚未创建，已延迟绑定。
    Deferred,
    /// 获取或新建了上下文并完成绑定。
    Bound,
    /// 绑定了导航携带的现成上下文。
    Reused,
    /// 路径未变化，执行了副作用刷新。
    Refreshed,
    /// 无事发生。
    Unchanged,
    /// 语义解析期间有更新的导航开始，本次结果被丢弃。
    Superseded,
    /// 绑定失败，已转交错误页或记录日志。
    Failed,
}

#[derive(Default)]
struct BinderState {
    bound: Option<ContextRef>,
    /// 当前上下文来自本页创建的隐藏绑定，被替换时由本页释放。
    owns_binding: bool,
    generation: u64,
}

/// 页面级的上下文绑定器。
pub struct ContextBinder {
    target: TargetInformation,
    model: Arc<dyn DataModel>,
    host: Arc<dyn PageHost>,
    extension: Arc<dyn PageExtension>,
    layout: Arc<dyn LayoutController>,
    router: Arc<dyn RouterLink>,
    errors: Arc<dyn ErrorPresenter>,
    resolver: SemanticPathResolver,
    side_effects: SideEffectsRefresher,
    settings: EngineSettings,
    hints: SelectionHints,
    state: Mutex<BinderState>,
}

impl fmt::Debug for ContextBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ContextBinder")
            .field("target", &self.target)
            .field("bound", &state.bound.as_ref().map(|c| c.path()))
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

impl ContextBinder {
    /// 以页面描述、数据模型与页面宿主开始构建绑定器。
    pub fn builder(
        target: TargetInformation,
        model: Arc<dyn DataModel>,
        host: Arc<dyn PageHost>,
    ) -> ContextBinderBuilder {
        ContextBinderBuilder::new(target, model, host)
    }

    /// 当前绑定的上下文。
    pub fn bound_context(&self) -> Option<ContextRef> {
        self.state.lock().bound.clone()
    }

    /// 注入的语义解析缓存。
    pub fn semantic_cache(&self) -> &Arc<SemanticCache> {
        self.resolver.cache()
    }

    /// 本页是否为当前路由的目标；路由信息未列出任何目标时视为目标。
    pub fn is_target_of_route(&self, route: &RouteInformation) -> bool {
        route.targets.is_empty() || route.targets.iter().any(|t| *t == self.target.target_name)
    }

    /// 处理一次路由命中事件。
    ///
    /// # 教案式注释
    /// - **执行 (How)**：
    ///   1. 非目标页忽略事件并使进行中的解析失效；若本页层级不低于路由层级，静默解除绑定；
    ///   2. 以页面的上下文模式（缺省用路由模式）构造绑定路径；
    ///   3. 延迟路径或携带异步上下文时走 [`ContextBinder::bind_deferred`]；否则先做语义解析，
    ///      解析期间若有更新的事件开始则丢弃结果，再进入 [`ContextBinder::bind`]；
    ///   4. 携带异步上下文时，暂停路由命中同步，等待其产出后导航进去，最后恢复同步。
    /// - **契约 (What)**：页面级失败转交错误页、可回退失败记录日志，二者都返回
    ///   `Ok(BindOutcome::Failed)`；只有配置缺陷以 `Err` 返回。
    pub async fn on_route_matched(
        &self,
        event: RouteMatchedEvent,
    ) -> Result<BindOutcome, BindingError> {
        if !self.is_target_of_route(&event.route_information) {
            // 进行中的语义解析不得在本事件之后再绑定。
            self.next_generation();
            if self.target.view_level >= event.route_information.route_level {
                debug!(target_name = %self.target.target_name, "page is beyond the matched route");
                self.set_binding_context(None, false);
                return Ok(BindOutcome::Unbound);
            }
            return Ok(BindOutcome::Skipped);
        }

        self.extension.on_route_matched();
        let generation = self.next_generation();

        let RouteMatchedEvent {
            route_pattern,
            arguments,
            navigation_info,
            ..
        } = event;
        let mut parameters = NavigationParameters::from(navigation_info);
        let pattern = self
            .target
            .context_pattern
            .as_deref()
            .unwrap_or(&route_pattern);
        let binding_path = build_path(&arguments, pattern, &mut parameters);

        let outcome = if binding_path.deferred
            || parameters.deferred_context
            || parameters.async_context.is_some()
        {
            self.bind_deferred(&binding_path.path, &parameters)
        } else {
            let technical = self.resolver.resolve(&binding_path.path).await;
            if self.is_current(generation) {
                match self
                    .bind(&BindingPath::resolved(technical), &parameters)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(err) => self.handle_failure(err)?,
                }
            } else {
                debug!(path = %technical, "newer navigation started; dropping resolution");
                BindOutcome::Superseded
            }
        };

        if let Some(producer) = parameters.async_context.take() {
            self.follow_async_context(producer, &parameters).await;
        }

        self.extension.on_route_matched_finished();
        Ok(outcome)
    }

    /// 以技术路径执行一次绑定决策。
    pub async fn bind(
        &self,
        path: &BindingPath,
        parameters: &NavigationParameters,
    ) -> Result<BindOutcome, BindingError> {
        if path.deferred {
            return Ok(self.bind_deferred(&path.path, parameters));
        }

        let technical = path.path.as_str();
        if technical.is_empty() {
            debug!("empty binding path; unbinding page");
            self.switch_context(None, false, hook_parameters(parameters));
            return Ok(BindOutcome::Unbound);
        }

        let current = self.bound_context();

        if let Some(supplied) = parameters
            .use_context
            .as_ref()
            .filter(|context| context.path() == technical)
        {
            if current
                .as_ref()
                .is_some_and(|current| same_context(current, supplied))
            {
                debug!(path = technical, "supplied context already bound");
                return Ok(BindOutcome::Unchanged);
            }
            self.prepare_reused_context(supplied, parameters);
            self.bind_to_context(Arc::clone(supplied), parameters, false)?;
            return Ok(BindOutcome::Reused);
        }

        if current.as_ref().map(|context| context.path()).as_deref() != Some(technical) {
            let context = self.create_context(technical)?;
            self.bind_to_context(context, parameters, true)?;
            return Ok(BindOutcome::Bound);
        }

        if parameters.reason != NavigationReason::AppStateChanged && self.host.is_edit_state_dirty()
        {
            if let Some(context) = current {
                if let Err(err) = self.side_effects.refresh(&context).await {
                    warn!(path = technical, error = %err, "side effects refresh failed; keeping current data");
                }
                return Ok(BindOutcome::Refreshed);
            }
        }

        debug!(path = technical, "binding unchanged");
        Ok(BindOutcome::Unchanged)
    }

    /// 延迟绑定：目标对象尚未创建。
    ///
    /// 未携带异步上下文时请宿主在 `path` 处物化待创建对象；当前上下文的未保存修改被丢弃，
    /// 以免在新对象上浮现过期的错误。
    pub fn bind_deferred(&self, path: &str, parameters: &NavigationParameters) -> BindOutcome {
        let hooks = hook_parameters(parameters);
        self.extension.on_before_binding(None, &hooks);

        if parameters.async_context.is_none() {
            self.host
                .create_deferred_context(path, parameters.action_create);
        }
        if let Some(current) = self.bound_context() {
            if current.has_pending_changes() {
                debug!(path = %current.path(), "discarding pending changes before deferred binding");
                current.reset_changes();
            }
        }
        self.set_binding_context(None, false);

        self.extension.on_after_binding(None, &hooks);
        debug!(path, "binding deferred until the object is created");
        BindOutcome::Deferred
    }

    /// 数据请求完成后的通知；携带错误时展示错误页。
    pub fn on_data_received(&self, error: Option<&DataError>) {
        if let Some(error) = error {
            self.display_data_error(error);
        }
    }

    fn next_generation(&self) -> u64 {
        let mut state = self.state.lock();
        state.generation += 1;
        state.generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn handle_failure(&self, err: BindingError) -> Result<BindOutcome, BindingError> {
        match err.class() {
            ErrorClass::Fatal => {
                error!(error = %err, "navigation binding misconfigured");
                Err(err)
            }
            ErrorClass::PageLevel => {
                match err.data_error() {
                    Some(source) => self.display_data_error(source),
                    None => self.display_data_error(&DataError::new(err.to_string())),
                }
                Ok(BindOutcome::Failed)
            }
            ErrorClass::Recoverable => {
                warn!(error = %err, "binding failed");
                Ok(BindOutcome::Failed)
            }
        }
    }

    fn display_data_error(&self, error: &DataError) {
        let page = error_page::for_data_error(error, self.target.fcl_level);
        self.errors
            .display_error_page(&page.message, &page.parameters);
    }

    fn metadata(&self, path: &str) -> EntityMetadata {
        self.model
            .entity_metadata(&meta_path(path))
            .unwrap_or_default()
    }

    /// 多列布局下获取 keep-alive 上下文，否则以隐藏绑定新建上下文。
    fn create_context(&self, path: &str) -> Result<ContextRef, BindingError> {
        let metadata = self.metadata(path);

        if self.layout.is_multi_column() {
            let context = self.obtain_keep_alive_context(path)?;
            if metadata.is_draft_enabled() && context.is_property_loaded(ACTIVE_ENTITY_PROPERTY) {
                let paths = metadata.draft_refresh_paths();
                let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
                context.request_properties(&paths);
            }
            return Ok(context);
        }

        let mut select = select_fields(&metadata, &self.hints);
        if metadata.is_draft_enabled() {
            for property in DRAFT_STATE_PROPERTIES {
                push_unique(&mut select, property);
            }
        }
        let binding = &self.settings.binding;
        let parameters = ContextParameters {
            group_id: binding.group_id.clone(),
            update_group_id: binding.update_group_id.clone(),
            patch_without_side_effects: binding.patch_without_side_effects,
            select,
        };
        debug!(path, select = ?parameters.select, "creating page context");
        self.model
            .bind_context(path, &parameters)
            .map_err(BindingError::data("binding the page context"))
    }

    /// 以最近的集合成员前缀获取 keep-alive 上下文，剩余后缀相对它绑定。
    fn obtain_keep_alive_context(&self, path: &str) -> Result<ContextRef, BindingError> {
        let split = split_keep_alive_path(path).ok_or_else(|| BindingError::KeepAliveUnavailable {
            path: path.to_owned(),
        })?;
        let request_messages = self.metadata(split.member).messages_path.is_some();
        let context = self
            .model
            .keep_alive_context(split.member, request_messages)
            .map_err(BindingError::data("obtaining a keep-alive context"))?;
        match split.relative {
            None => Ok(context),
            Some(relative) => self
                .model
                .bind_relative_context(&context, relative)
                .map_err(BindingError::data("binding a relative continuation")),
        }
    }

    /// 多列布局 + 行点击时刷新复用的列表行上下文；有未保存修改时按策略决定丢弃或跳过刷新。
    fn prepare_reused_context(&self, context: &ContextRef, parameters: &NavigationParameters) {
        if !self.layout.is_multi_column()
            || parameters.reason != NavigationReason::RowPress
            || context.parent_binding() != ParentBinding::List
        {
            return;
        }
        if context.has_pending_changes() {
            let discard = self.settings.pending_changes.should_discard(
                self.host.is_collaboration_active(),
                self.host.is_connected(),
            );
            if !discard {
                debug!(path = %context.path(), "keeping pending changes; refresh skipped");
                return;
            }
            debug!(path = %context.path(), "discarding pending changes before refresh");
            context.reset_changes();
        }
        context.refresh();
    }

    /// 把上下文绑定到页面。
    ///
    /// `fresh` 表示上下文刚由 [`ContextBinder::create_context`] 产出；否则按布局决定是否重建：
    /// 多列布局下非列表行上下文改用 keep-alive 上下文，单列布局下除对象绑定以外的上下文都重建，
    /// 以免沿用缓存中过期的错误。
    fn bind_to_context(
        &self,
        context: ContextRef,
        parameters: &NavigationParameters,
        fresh: bool,
    ) -> Result<(), BindingError> {
        let multi_column = self.layout.is_multi_column();
        let recreate = !fresh
            && if multi_column {
                context.parent_binding() != ParentBinding::List
            } else {
                context.parent_binding() != ParentBinding::Context
            };
        let context = if recreate {
            self.create_context(&context.path())?
        } else {
            context
        };
        let owned = (fresh || recreate) && context.parent_binding() == ParentBinding::Context;

        if multi_column {
            self.grant_keep_alive(&context);
        }
        self.switch_context(Some(context), owned, hook_parameters(parameters));
        Ok(())
    }

    fn grant_keep_alive(&self, context: &ContextRef) {
        let path = context.path();
        if !is_collection_member(&path) {
            debug!(path = %path, "relative continuation stays bound to its keep-alive parent");
            return;
        }

        let weak: Weak<dyn DataContext> = Arc::downgrade(context);
        let layout = Arc::clone(&self.layout);
        let on_before_destroy: BeforeDestroy = Box::new(move || {
            let Some(context) = weak.upgrade() else {
                return;
            };
            if layout.is_context_used_in_pages(&context) {
                layout.navigate_back_from_context(&context);
            }
        });
        let request_messages = self.metadata(&path).messages_path.is_some();
        if let Err(err) = keep_alive::grant(context, on_before_destroy, request_messages) {
            error!(path = %path, error = %err, "view will not be synchronized across columns");
        }
    }

    fn switch_context(&self, next: Option<ContextRef>, owned: bool, hooks: BindingHookParameters) {
        self.extension.on_before_binding(next.as_ref(), &hooks);
        self.set_binding_context(next.clone(), owned);
        self.extension.on_after_binding(next.as_ref(), &hooks);
    }

    /// 替换当前上下文：释放旧上下文的 keep-alive，旧的隐藏绑定若由本页创建则一并释放。不触发钩子。
    fn set_binding_context(&self, next: Option<ContextRef>, owned: bool) {
        let (previous, previously_owned) = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.bound, next.clone());
            let owned = std::mem::replace(&mut state.owns_binding, owned && next.is_some());
            (previous, owned)
        };
        self.host.apply_binding_context(next.as_ref());
        keep_alive::release(previous.as_ref(), next.as_ref());

        if let Some(previous) = previous {
            let superseded = next
                .as_ref()
                .is_none_or(|next| !same_context(&previous, next));
            if superseded && previously_owned {
                debug!(path = %previous.path(), "releasing superseded page binding");
                previous.release_binding();
            }
        }
    }

    async fn follow_async_context(&self, producer: AsyncContext, parameters: &NavigationParameters) {
        self.router.pause_route_match_synchronization();
        match producer.await {
            Ok(context) => {
                debug!(path = %context.path(), "async context ready; navigating into it");
                self.router.navigate_to_context(
                    &context,
                    &NavigateOptions {
                        editable: parameters.target_editable,
                        persist_scroll: parameters.persist_scroll,
                        fcl_level_delta: parameters.fcl_level_delta,
                    },
                );
            }
            Err(err) => error!(error = %err, "async context could not be created"),
        }
        self.router.resume_route_match_synchronization();
    }
}

fn hook_parameters(parameters: &NavigationParameters) -> BindingHookParameters {
    BindingHookParameters {
        editable: parameters.target_editable,
        reason: parameters.reason,
        draft_navigation: parameters.draft_navigation,
        show_placeholder: parameters.show_placeholder,
    }
}

/// [`ContextBinder`] 构建器。
pub struct ContextBinderBuilder {
    target: TargetInformation,
    model: Arc<dyn DataModel>,
    host: Arc<dyn PageHost>,
    settings: EngineSettings,
    cache: Option<Arc<SemanticCache>>,
    hints: SelectionHints,
    extension: Arc<dyn PageExtension>,
    layout: Arc<dyn LayoutController>,
    router: Arc<dyn RouterLink>,
    errors: Arc<dyn ErrorPresenter>,
}

impl ContextBinderBuilder {
    /// 以必需的协作方创建构建器，其余协作方取默认实现。
    pub fn new(
        target: TargetInformation,
        model: Arc<dyn DataModel>,
        host: Arc<dyn PageHost>,
    ) -> Self {
        Self {
            target,
            model,
            host,
            settings: EngineSettings::default(),
            cache: None,
            hints: SelectionHints::default(),
            extension: Arc::new(NoopExtension),
            layout: Arc::new(SingleColumnLayout),
            router: Arc::new(DetachedRouter),
            errors: Arc::new(LoggingErrorPresenter),
        }
    }

    /// 设置引擎配置。
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 注入共享的语义解析缓存；未设置时每个绑定器独占一个缓存。
    pub fn with_cache(mut self, cache: Arc<SemanticCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 设置页面配置提供的 `$select` 提示。
    pub fn with_selection_hints(mut self, hints: SelectionHints) -> Self {
        self.hints = hints;
        self
    }

    /// 注册页面级扩展钩子。
    pub fn with_extension(mut self, extension: Arc<dyn PageExtension>) -> Self {
        self.extension = extension;
        self
    }

    /// 设置多列布局控制器。
    pub fn with_layout(mut self, layout: Arc<dyn LayoutController>) -> Self {
        self.layout = layout;
        self
    }

    /// 设置路由器协作方。
    pub fn with_router(mut self, router: Arc<dyn RouterLink>) -> Self {
        self.router = router;
        self
    }

    /// 设置错误页展示协作方。
    pub fn with_error_presenter(mut self, errors: Arc<dyn ErrorPresenter>) -> Self {
        self.errors = errors;
        self
    }

    /// 构建绑定器，初始状态为未绑定。
    pub fn build(self) -> ContextBinder {
        let cache = self.cache.unwrap_or_default();
        ContextBinder {
            resolver: SemanticPathResolver::new(
                Arc::clone(&self.model),
                cache,
                self.settings.semantic.clone(),
            ),
            side_effects: SideEffectsRefresher::new(Arc::clone(&self.model)),
            target: self.target,
            model: self.model,
            host: self.host,
            extension: self.extension,
            layout: self.layout,
            router: self.router,
            errors: self.errors,
            settings: self.settings,
            hints: self.hints,
            state: Mutex::new(BinderState::default()),
        }
    }
}
