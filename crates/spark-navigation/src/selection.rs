//! 新建非 keep-alive 上下文时的 `$select` 计算。
//!
//! 结果是以下来源的并集（保持首次出现的顺序、去重）：自定义列引用的属性、行级导航可用性条件、
//! 批量操作前置条件、语义键、消息集合路径、删除/更新前置条件、展示变体的 `RequestAtLeast`。
//! 以 `/` 开头的绝对路径（单例根）无法相对于行表达，一律排除。

use serde::Deserialize;

use crate::data::EntityMetadata;

/// 页面配置提供的属性引用。
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct SelectionHints {
    /// 自定义列引用的属性。
    pub custom_column_properties: Vec<String>,
    /// 行级动作导航可用性条件引用的属性。
    pub navigation_condition_properties: Vec<String>,
    /// 批量操作前置条件表达式引用的属性。
    pub operation_precondition_properties: Vec<String>,
}

/// 计算新上下文需要请求的属性集合。
pub fn select_fields(metadata: &EntityMetadata, hints: &SelectionHints) -> Vec<String> {
    let mut selection = Vec::new();
    let sources = hints
        .custom_column_properties
        .iter()
        .chain(&hints.navigation_condition_properties)
        .chain(&hints.operation_precondition_properties)
        .chain(&metadata.semantic_keys)
        .chain(&metadata.messages_path)
        .chain(&metadata.delete_restriction_path)
        .chain(&metadata.update_restriction_path)
        .chain(&metadata.request_at_least);
    for path in sources {
        push_unique(&mut selection, path);
    }
    selection
}

/// 追加相对路径，跳过空串、绝对路径与重复项。
pub(crate) fn push_unique(selection: &mut Vec<String>, path: &str) {
    if path.is_empty() || path.starts_with('/') || selection.iter().any(|p| p == path) {
        return;
    }
    selection.push(path.to_owned());
}
