//! 场景测试共享的内存数据层与记录型协作方。
//!
//! # 教案级注释
//! - **意图 (Why)**：绑定器的行为只能通过协作方观察；`Recorder` 把所有回调按顺序记成事件串，
//!   `MemoryModel`/`MemoryContext` 记录每一次数据层调用，测试据此断言调用次数与顺序；
//! - **契约 (What)**：所有状态都放在 `parking_lot::Mutex` 中，锁从不跨越 `.await`；
//!   语义查询可以通过 `gate_next_lookup` 挂起，用于构造“慢的旧导航”；
//! - **风险 (Trade-offs)**：内存实现不模拟网络延迟与分组调度，`refresh` 只计数。

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::oneshot;
use parking_lot::Mutex;
use spark_navigation::ContextBinder;
use spark_navigation::binder::{
    BindingHookParameters, ErrorPageParameters, ErrorPresenter, LayoutController,
    NavigateOptions, PageExtension, PageHost, RouterLink,
};
use spark_navigation::data::{
    BeforeDestroy, Binding, CollectionQuery, ContextParameters, ContextRef, DataContext,
    DataModel, EntityMetadata, ParentBinding,
};
use spark_navigation::error::DataError;
use spark_navigation::filter::FilterValue;
use spark_navigation::navigation::TargetInformation;

#[derive(Default)]
struct ContextState {
    keep_alive: bool,
    before_destroy: Option<BeforeDestroy>,
    keep_alive_calls: Vec<(bool, bool)>,
    reject_keep_alive: bool,
    pending_changes: bool,
    loaded: Vec<String>,
    requested_properties: Vec<Vec<String>>,
    refreshes: usize,
    resets: usize,
    releases: usize,
    dependents: Vec<Binding>,
    side_effects: Vec<Vec<String>>,
    side_effects_error: Option<DataError>,
}

/// 内存上下文。
pub struct MemoryContext {
    path: String,
    parent: ParentBinding,
    state: Mutex<ContextState>,
}

impl fmt::Debug for MemoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryContext")
            .field("path", &self.path)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

impl MemoryContext {
    pub fn new(path: impl Into<String>, parent: ParentBinding) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            parent,
            state: Mutex::new(ContextState::default()),
        })
    }

    /// 列表行上下文。
    pub fn row(path: impl Into<String>) -> Arc<Self> {
        Self::new(path, ParentBinding::List)
    }

    pub fn set_pending_changes(&self, pending: bool) {
        self.state.lock().pending_changes = pending;
    }

    pub fn mark_loaded(&self, property: &str) {
        self.state.lock().loaded.push(property.to_owned());
    }

    pub fn set_dependents(&self, dependents: Vec<Binding>) {
        self.state.lock().dependents = dependents;
    }

    pub fn fail_side_effects(&self, error: DataError) {
        self.state.lock().side_effects_error = Some(error);
    }

    pub fn reject_keep_alive(&self) {
        self.state.lock().reject_keep_alive = true;
    }

    /// 模拟数据层销毁：先取出回调再调用，避免在回调期间持锁。
    pub fn destroy(&self) {
        let callback = self.state.lock().before_destroy.take();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn is_keep_alive_granted(&self) -> bool {
        self.state.lock().keep_alive
    }

    pub fn keep_alive_calls(&self) -> Vec<(bool, bool)> {
        self.state.lock().keep_alive_calls.clone()
    }

    pub fn requested_properties(&self) -> Vec<Vec<String>> {
        self.state.lock().requested_properties.clone()
    }

    pub fn refreshes(&self) -> usize {
        self.state.lock().refreshes
    }

    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn side_effect_requests(&self) -> Vec<Vec<String>> {
        self.state.lock().side_effects.clone()
    }
}

#[async_trait]
impl DataContext for MemoryContext {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn parent_binding(&self) -> ParentBinding {
        self.parent
    }

    fn is_keep_alive(&self) -> bool {
        self.state.lock().keep_alive
    }

    fn set_keep_alive(
        &self,
        keep_alive: bool,
        on_before_destroy: Option<BeforeDestroy>,
        request_messages: bool,
    ) -> Result<(), DataError> {
        let mut state = self.state.lock();
        state.keep_alive_calls.push((keep_alive, request_messages));
        if keep_alive && state.reject_keep_alive {
            return Err(DataError::new("parent list binding has no own request"));
        }
        state.keep_alive = keep_alive;
        state.before_destroy = on_before_destroy;
        Ok(())
    }

    fn has_pending_changes(&self) -> bool {
        self.state.lock().pending_changes
    }

    fn reset_changes(&self) {
        let mut state = self.state.lock();
        state.pending_changes = false;
        state.resets += 1;
    }

    fn is_property_loaded(&self, property: &str) -> bool {
        self.state.lock().loaded.iter().any(|p| p == property)
    }

    fn request_properties(&self, properties: &[&str]) {
        self.state
            .lock()
            .requested_properties
            .push(properties.iter().map(|p| (*p).to_owned()).collect());
    }

    fn refresh(&self) {
        self.state.lock().refreshes += 1;
    }

    fn release_binding(&self) {
        self.state.lock().releases += 1;
    }

    fn dependent_bindings(&self) -> Vec<Binding> {
        self.state.lock().dependents.clone()
    }

    async fn request_side_effects(&self, paths: Vec<String>) -> Result<(), DataError> {
        let mut state = self.state.lock();
        state.side_effects.push(paths);
        match state.side_effects_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// 内存数据模型。
#[derive(Default)]
pub struct MemoryModel {
    metadata: Mutex<HashMap<String, EntityMetadata>>,
    lookups: Mutex<HashMap<String, String>>,
    lookup_error: Mutex<Option<DataError>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    queries: Mutex<Vec<CollectionQuery>>,
    case_insensitive: Mutex<bool>,
    bind_error: Mutex<Option<DataError>>,
    bound: Mutex<Vec<(String, ContextParameters)>>,
    created: Mutex<Vec<Arc<MemoryContext>>>,
    keep_alive: Mutex<HashMap<String, Arc<MemoryContext>>>,
    keep_alive_requests: Mutex<Vec<(String, bool)>>,
    relative: Mutex<Vec<(String, String)>>,
}

impl MemoryModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_metadata(&self, meta_path: &str, metadata: EntityMetadata) {
        self.metadata.lock().insert(meta_path.to_owned(), metadata);
    }

    /// 以第一个语义键取值登记查询结果。
    pub fn set_lookup(&self, first_key_value: &str, technical_path: &str) {
        self.lookups
            .lock()
            .insert(first_key_value.to_owned(), technical_path.to_owned());
    }

    pub fn fail_lookups(&self, error: DataError) {
        *self.lookup_error.lock() = Some(error);
    }

    pub fn set_case_insensitive(&self) {
        *self.case_insensitive.lock() = true;
    }

    /// 下一次语义查询挂起，直到返回的发送端被触发或丢弃。
    pub fn gate_next_lookup(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.gates.lock().push_back(receiver);
        sender
    }

    pub fn fail_binding(&self, error: DataError) {
        *self.bind_error.lock() = Some(error);
    }

    /// 预先放入一个 keep-alive 候选上下文。
    pub fn register_keep_alive(&self, context: Arc<MemoryContext>) {
        self.keep_alive
            .lock()
            .insert(context.path(), context);
    }

    pub fn queries(&self) -> Vec<CollectionQuery> {
        self.queries.lock().clone()
    }

    pub fn bound(&self) -> Vec<(String, ContextParameters)> {
        self.bound.lock().clone()
    }

    pub fn created(&self) -> Vec<Arc<MemoryContext>> {
        self.created.lock().clone()
    }

    pub fn keep_alive_context_for(&self, path: &str) -> Option<Arc<MemoryContext>> {
        self.keep_alive.lock().get(path).cloned()
    }

    pub fn keep_alive_requests(&self) -> Vec<(String, bool)> {
        self.keep_alive_requests.lock().clone()
    }

    pub fn relative_bindings(&self) -> Vec<(String, String)> {
        self.relative.lock().clone()
    }
}

#[async_trait]
impl DataModel for MemoryModel {
    fn entity_metadata(&self, meta_path: &str) -> Option<EntityMetadata> {
        self.metadata.lock().get(meta_path).cloned()
    }

    fn is_filtering_case_sensitive(&self) -> bool {
        !*self.case_insensitive.lock()
    }

    fn bind_context(
        &self,
        path: &str,
        parameters: &ContextParameters,
    ) -> Result<ContextRef, DataError> {
        if let Some(error) = self.bind_error.lock().clone() {
            return Err(error);
        }
        self.bound
            .lock()
            .push((path.to_owned(), parameters.clone()));
        let context = MemoryContext::new(path, ParentBinding::Context);
        self.created.lock().push(Arc::clone(&context));
        Ok(context)
    }

    fn keep_alive_context(
        &self,
        member_path: &str,
        request_messages: bool,
    ) -> Result<ContextRef, DataError> {
        self.keep_alive_requests
            .lock()
            .push((member_path.to_owned(), request_messages));
        let context = self
            .keep_alive
            .lock()
            .entry(member_path.to_owned())
            .or_insert_with(|| MemoryContext::row(member_path))
            .clone();
        Ok(context)
    }

    fn bind_relative_context(
        &self,
        parent: &ContextRef,
        relative_path: &str,
    ) -> Result<ContextRef, DataError> {
        self.relative
            .lock()
            .push((parent.path(), relative_path.to_owned()));
        let context = MemoryContext::new(
            format!("{}/{relative_path}", parent.path()),
            ParentBinding::Context,
        );
        self.created.lock().push(Arc::clone(&context));
        Ok(context)
    }

    async fn request_contexts(&self, query: &CollectionQuery) -> Result<Vec<String>, DataError> {
        self.queries.lock().push(query.clone());
        let gate = self.gates.lock().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(error) = self.lookup_error.lock().clone() {
            return Err(error);
        }
        let first_value = query
            .filter
            .conditions()
            .first()
            .and_then(|condition| match &condition.value {
                FilterValue::Text(text) => Some(text.clone()),
                _ => None,
            });
        let lookups = self.lookups.lock();
        Ok(first_value
            .and_then(|value| lookups.get(&value).cloned())
            .into_iter()
            .collect())
    }
}

/// 记录所有协作方回调的宿主。
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
    multi_column: Mutex<bool>,
    used_in_pages: Mutex<bool>,
    dirty: Mutex<bool>,
    disconnected: Mutex<bool>,
    collaboration: Mutex<bool>,
    error_pages: Mutex<Vec<(String, ErrorPageParameters)>>,
    navigations: Mutex<Vec<(String, NavigateOptions)>>,
    hooks: Mutex<Vec<BindingHookParameters>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn multi_column() -> Arc<Self> {
        let recorder = Self::default();
        *recorder.multi_column.lock() = true;
        Arc::new(recorder)
    }

    pub fn set_used_in_pages(&self, used: bool) {
        *self.used_in_pages.lock() = used;
    }

    pub fn set_dirty(&self, dirty: bool) {
        *self.dirty.lock() = dirty;
    }

    pub fn set_disconnected(&self, disconnected: bool) {
        *self.disconnected.lock() = disconnected;
    }

    pub fn set_collaboration(&self, active: bool) {
        *self.collaboration.lock() = active;
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn error_pages(&self) -> Vec<(String, ErrorPageParameters)> {
        self.error_pages.lock().clone()
    }

    pub fn navigations(&self) -> Vec<(String, NavigateOptions)> {
        self.navigations.lock().clone()
    }

    pub fn hooks(&self) -> Vec<BindingHookParameters> {
        self.hooks.lock().clone()
    }
}

fn describe(context: Option<&ContextRef>) -> String {
    context.map_or_else(|| "none".to_owned(), |context| context.path())
}

impl PageHost for Recorder {
    fn apply_binding_context(&self, context: Option<&ContextRef>) {
        self.record(format!("apply:{}", describe(context)));
    }

    fn create_deferred_context(&self, path: &str, action_create: bool) {
        self.record(format!("deferred:{path}:{action_create}"));
    }

    fn is_connected(&self) -> bool {
        !*self.disconnected.lock()
    }

    fn is_edit_state_dirty(&self) -> bool {
        *self.dirty.lock()
    }

    fn is_collaboration_active(&self) -> bool {
        *self.collaboration.lock()
    }
}

impl PageExtension for Recorder {
    fn on_before_binding(&self, context: Option<&ContextRef>, parameters: &BindingHookParameters) {
        self.hooks.lock().push(*parameters);
        self.record(format!("before:{}", describe(context)));
    }

    fn on_after_binding(&self, context: Option<&ContextRef>, _parameters: &BindingHookParameters) {
        self.record(format!("after:{}", describe(context)));
    }

    fn on_route_matched(&self) {
        self.record("route_matched".to_owned());
    }

    fn on_route_matched_finished(&self) {
        self.record("route_matched_finished".to_owned());
    }
}

impl LayoutController for Recorder {
    fn is_multi_column(&self) -> bool {
        *self.multi_column.lock()
    }

    fn is_context_used_in_pages(&self, _context: &ContextRef) -> bool {
        *self.used_in_pages.lock()
    }

    fn navigate_back_from_context(&self, context: &ContextRef) {
        self.record(format!("navigate_back:{}", context.path()));
    }
}

impl RouterLink for Recorder {
    fn pause_route_match_synchronization(&self) {
        self.record("pause".to_owned());
    }

    fn resume_route_match_synchronization(&self) {
        self.record("resume".to_owned());
    }

    fn navigate_to_context(&self, context: &ContextRef, options: &NavigateOptions) {
        self.navigations.lock().push((context.path(), *options));
        self.record(format!("navigate:{}", context.path()));
    }
}

impl ErrorPresenter for Recorder {
    fn display_error_page(&self, message: &str, parameters: &ErrorPageParameters) {
        self.error_pages
            .lock()
            .push((message.to_owned(), parameters.clone()));
        self.record(format!("error:{}", parameters.description));
    }
}

/// 以记录器充当全部协作方构建绑定器。
pub fn binder(
    model: &Arc<MemoryModel>,
    recorder: &Arc<Recorder>,
    target: TargetInformation,
) -> ContextBinder {
    ContextBinder::builder(target, model.clone(), recorder.clone())
        .with_extension(recorder.clone())
        .with_layout(recorder.clone())
        .with_router(recorder.clone())
        .with_error_presenter(recorder.clone())
        .build()
}

/// 草稿根实体，声明单个语义键。
pub fn draft_root(semantic_keys: &[&str]) -> EntityMetadata {
    EntityMetadata {
        draft: Some(spark_navigation::data::DraftKind::Root),
        semantic_keys: semantic_keys.iter().map(|k| (*k).to_owned()).collect(),
        ..EntityMetadata::default()
    }
}
