//! # 副作用刷新
//!
//! ## 核心意图（Why）
//! - 路由与路径均未变化、但本地状态表明数据可能过期（例如从编辑流程返回且表单仍为脏）时，
//!   只重新拉取依赖于该上下文的导航与属性路径；
//! - 直接重载上下文对“尚未持久化”的新建行并不安全，这里走数据层的批量副作用请求。
//!
//! ## 行为概览（How）
//! 1. 自根上下文的依赖绑定开始深度遍历：对象绑定有依赖则继续下钻，否则记录自身路径为导航路径；
//!    列表绑定记录为导航路径；属性绑定记录为属性路径；
//! 2. 属性路径含 `/` 时截断为首段（请求父导航而非叶子属性），两组路径各自去重；
//! 3. 追加实体声明的消息集合路径；
//! 4. 把“导航路径 + 属性路径”作为一次请求交给数据层，跨组去重由数据层负责。

use std::sync::Arc;

use tracing::debug;

use crate::data::{Binding, ContextRef, DataModel};
use crate::error::BindingError;
use crate::path::meta_path;
use crate::selection::push_unique;

/// 一次副作用刷新请求的路径集合。
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SideEffectsRequest {
    pub navigation_paths: Vec<String>,
    pub property_paths: Vec<String>,
}

impl SideEffectsRequest {
    /// 从依赖绑定树收集路径（不含消息集合路径）。
    pub fn from_bindings(bindings: &[Binding]) -> Self {
        let mut request = SideEffectsRequest::default();
        for binding in bindings {
            request.visit(binding, "");
        }
        request
    }

    fn visit(&mut self, binding: &Binding, prefix: &str) {
        match binding {
            Binding::Object(object) => {
                let path = join(prefix, &object.path);
                if object.dependents.is_empty() {
                    push_unique(&mut self.navigation_paths, &path);
                } else {
                    for dependent in &object.dependents {
                        self.visit(dependent, &path);
                    }
                }
            }
            Binding::List(list) => push_unique(&mut self.navigation_paths, &join(prefix, &list.path)),
            Binding::Property(property) => {
                let path = join(prefix, &property.path);
                let head = path.split('/').next().unwrap_or_default();
                push_unique(&mut self.property_paths, head);
            }
        }
    }

    /// 追加一个属性路径（去重）。
    pub fn push_property(&mut self, path: &str) {
        push_unique(&mut self.property_paths, path);
    }

    /// 导航路径在前、属性路径在后的合并列表。
    pub fn paths(&self) -> Vec<String> {
        self.navigation_paths
            .iter()
            .chain(&self.property_paths)
            .cloned()
            .collect()
    }

    /// 是否没有任何路径。
    pub fn is_empty(&self) -> bool {
        self.navigation_paths.is_empty() && self.property_paths.is_empty()
    }
}

fn join(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_owned(),
        (false, true) => prefix.to_owned(),
        (false, false) => format!("{prefix}/{path}"),
    }
}

/// 副作用刷新器。
pub struct SideEffectsRefresher {
    model: Arc<dyn DataModel>,
}

impl SideEffectsRefresher {
    /// 以数据模型构造刷新器（用于读取消息集合路径）。
    pub fn new(model: Arc<dyn DataModel>) -> Self {
        Self { model }
    }

    /// 计算需要刷新的路径集合。
    pub fn collect(&self, context: &ContextRef) -> SideEffectsRequest {
        let mut request = SideEffectsRequest::from_bindings(&context.dependent_bindings());
        if let Some(messages_path) = self
            .model
            .entity_metadata(&meta_path(&context.path()))
            .and_then(|metadata| metadata.messages_path)
        {
            request.push_property(&messages_path);
        }
        request
    }

    /// 对上下文执行一次副作用刷新，返回实际请求的路径集合。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：路径集合为空时不发请求；数据层失败返回 [`BindingError::SideEffects`]，
    ///   由调用方记录日志后继续（视图仍可使用稍旧的数据）。
    pub async fn refresh(&self, context: &ContextRef) -> Result<SideEffectsRequest, BindingError> {
        let request = self.collect(context);
        if request.is_empty() {
            debug!(path = %context.path(), "no dependent paths to refresh");
            return Ok(request);
        }
        context
            .request_side_effects(request.paths())
            .await
            .map_err(|source| BindingError::SideEffects {
                path: context.path(),
                source,
            })?;
        debug!(path = %context.path(), paths = ?request.paths(), "side effects requested");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_splits_navigation_and_property_paths() {
        let bindings = vec![
            Binding::property("Amount"),
            Binding::property("_Customer/Name"),
            Binding::list("_Items"),
            Binding::object(
                "_Customer",
                vec![Binding::property("Name"), Binding::list("_Addresses")],
            ),
            Binding::object("_Supplier", Vec::new()),
            Binding::list("_Items"),
            Binding::property("Amount"),
        ];

        let request = SideEffectsRequest::from_bindings(&bindings);
        assert_eq!(
            request.navigation_paths,
            ["_Items", "_Customer/_Addresses", "_Supplier"]
        );
        assert_eq!(request.property_paths, ["Amount", "_Customer"]);
        assert_eq!(
            request.paths(),
            [
                "_Items",
                "_Customer/_Addresses",
                "_Supplier",
                "Amount",
                "_Customer"
            ]
        );
    }

    #[test]
    fn nested_objects_compose_relative_paths() {
        let bindings = vec![Binding::object(
            "_Header",
            vec![Binding::object("_Status", Vec::new())],
        )];
        let request = SideEffectsRequest::from_bindings(&bindings);
        assert_eq!(request.navigation_paths, ["_Header/_Status"]);
        assert!(request.property_paths.is_empty());
    }

    #[test]
    fn empty_tree_yields_empty_request() {
        assert!(SideEffectsRequest::from_bindings(&[]).is_empty());
    }
}
