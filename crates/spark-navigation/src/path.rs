//! # 绑定路径构造
//!
//! ## 核心意图（Why）
//! - 把路由命中参数代入页面的上下文模式，得到以 `/` 开头的绝对绑定路径；
//! - 识别“对象尚未创建”（参数值为省略号 `...`）与“通过动作创建”（查询包含 `i-action`）两类特殊导航。
//!
//! ## 契约（What）
//! - [`build_path`] 是确定性的同步纯函数，唯一副作用是写入传入的 [`NavigationParameters`]；
//! - 其余辅助函数（[`meta_path`]、[`split_keep_alive_path`] 等）只做字符串切分，不访问数据层。

use crate::navigation::{NavigationParameters, RouteArguments};

/// 上下文模式中需要剥离的查询占位后缀。
pub const QUERY_SUFFIX: &str = ":?query:";
/// 表示“对象正在创建、尚未持久化”的参数值。
pub const DEFERRED_TOKEN: &str = "...";
/// 查询参数包中表示“通过动作创建”的键。
pub const ACTION_CREATE_MARKER: &str = "i-action";

/// 一次导航计算出的绑定路径。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BindingPath {
    /// 绝对路径；为空表示“未选择任何对象”。
    pub path: String,
    /// 目标对象尚未创建，需要延迟绑定。
    pub deferred: bool,
}

impl BindingPath {
    /// 构造非延迟的绑定路径。
    pub fn resolved(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            deferred: false,
        }
    }
}

/// 根据命中参数与上下文模式构造绑定路径。
///
/// # 教案式注释
/// - **执行 (How)**：
///   1. 剥离模式中的 `:?query:` 后缀；
///   2. 逐个参数替换 `{key}` 占位符；若参数值为 `...` 且占位符仍在路径中，标记 `deferred`
///      并要求目标页以可编辑状态渲染；
///   3. 查询参数包含 `i-action` 时标记 `action_create`；
///   4. 非空且不以 `/` 开头的路径补齐前导 `/`。
/// - **契约 (What)**：省略号按字面量代入，不会被替换成真实键值。
pub fn build_path(
    arguments: &RouteArguments,
    pattern: &str,
    parameters: &mut NavigationParameters,
) -> BindingPath {
    let mut path = pattern.replace(QUERY_SUFFIX, "");
    let mut deferred = false;

    for (key, value) in arguments.iter() {
        let placeholder = format!("{{{key}}}");
        if !path.contains(&placeholder) {
            continue;
        }
        if value == DEFERRED_TOKEN {
            deferred = true;
            parameters.target_editable = true;
        }
        path = path.replacen(&placeholder, value, 1);
    }

    if arguments
        .query()
        .is_some_and(|query| query.contains_key(ACTION_CREATE_MARKER))
    {
        parameters.action_create = true;
    }

    if !path.is_empty() && !path.starts_with('/') {
        path.insert(0, '/');
    }

    BindingPath { path, deferred }
}

/// 路径是否指向集合成员（以 `)` 结尾）。
pub fn is_collection_member(path: &str) -> bool {
    path.ends_with(')')
}

/// 去掉所有键谓词，得到元数据路径：`/Orders(1)/_Items(2)` → `/Orders/_Items`。
///
/// 单引号内的括号视为键值的一部分。
pub fn meta_path(path: &str) -> String {
    let mut meta = String::with_capacity(path.len());
    let mut depth = 0usize;
    let mut quoted = false;
    for ch in path.chars() {
        match ch {
            '\'' if depth > 0 => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted && depth > 0 => depth -= 1,
            _ if depth == 0 => meta.push(ch),
            _ => {}
        }
    }
    meta
}

/// keep-alive 路径拆分结果。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeepAlivePath<'a> {
    /// 最近的集合成员前缀，例如 `/Orders(1)`。
    pub member: &'a str,
    /// 前缀之后的相对后缀（不含分隔符 `/`），例如 `_Customer`。
    pub relative: Option<&'a str>,
}

/// 把路径拆分为“最近的集合成员前缀 + 相对后缀”。
///
/// 前缀以最后一个 `)` 为界；路径中不存在 `)`、前缀不含 `(`、或后缀不以 `/` 分隔时返回 `None`。
pub fn split_keep_alive_path(path: &str) -> Option<KeepAlivePath<'_>> {
    let close = path.rfind(')')?;
    let (member, rest) = path.split_at(close + 1);
    let last_segment = member.rsplit('/').next().unwrap_or(member);
    if !member.starts_with('/') || !last_segment.contains('(') {
        return None;
    }
    let relative = match rest {
        "" => None,
        rest => {
            let relative = rest.strip_prefix('/')?;
            if relative.is_empty() {
                None
            } else {
                Some(relative)
            }
        }
    };
    Some(KeepAlivePath { member, relative })
}

/// 单段根路径 `/EntitySet(keys)` 的拆分结果。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RootMember<'a> {
    /// 实体集名称。
    pub entity_set: &'a str,
    /// 括号内的键表达式。
    pub key_expression: &'a str,
}

/// 若路径形如 `/EntitySet(keyExpression)`（前导 `/` 可省略，键表达式非空且不含 `/`），返回拆分结果。
pub fn parse_root_member(path: &str) -> Option<RootMember<'_>> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let open = path.find('(')?;
    let (entity_set, rest) = path.split_at(open);
    let key_expression = rest.strip_prefix('(')?.strip_suffix(')')?;
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    if entity_set.is_empty()
        || !entity_set.chars().all(is_word)
        || key_expression.is_empty()
        || key_expression.contains('/')
    {
        return None;
    }
    Some(RootMember {
        entity_set,
        key_expression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(arguments: &RouteArguments, pattern: &str) -> (BindingPath, NavigationParameters) {
        let mut parameters = NavigationParameters::default();
        let path = build_path(arguments, pattern, &mut parameters);
        (path, parameters)
    }

    #[test]
    fn substitutes_matched_key() {
        let (path, parameters) = build(&RouteArguments::new().with("id", "4711"), "Orders({id})");
        assert_eq!(path, BindingPath::resolved("/Orders(4711)"));
        assert!(!parameters.target_editable);
    }

    #[test]
    fn ellipsis_marks_deferred_and_editable() {
        let (path, parameters) = build(&RouteArguments::new().with("id", "..."), "Orders({id})");
        assert_eq!(path.path, "/Orders(...)");
        assert!(path.deferred);
        assert!(parameters.target_editable);
    }

    #[test]
    fn ellipsis_for_absent_placeholder_is_ignored() {
        let (path, parameters) = build(
            &RouteArguments::new().with("id", "1").with("other", "..."),
            "Orders({id})",
        );
        assert_eq!(path, BindingPath::resolved("/Orders(1)"));
        assert!(!parameters.target_editable);
    }

    #[test]
    fn query_suffix_is_stripped_and_action_create_detected() {
        let arguments = RouteArguments::new()
            .with("id", "7")
            .with_query("i-action", "create");
        let (path, parameters) = build(&arguments, "Orders({id}):?query:");
        assert_eq!(path.path, "/Orders(7)");
        assert!(parameters.action_create);
    }

    #[test]
    fn nested_pattern_and_existing_slash() {
        let arguments = RouteArguments::new().with("id", "1").with("item", "10");
        let (path, _) = build(&arguments, "/Orders({id})/_Items({item})");
        assert_eq!(path.path, "/Orders(1)/_Items(10)");
    }

    #[test]
    fn empty_pattern_stays_empty() {
        let (path, _) = build(&RouteArguments::new(), "");
        assert_eq!(path, BindingPath::resolved(""));
    }

    #[test]
    fn meta_path_strips_key_predicates() {
        assert_eq!(meta_path("/Orders(1)/_Items(ID=2,Pos='a(b)')"), "/Orders/_Items");
        assert_eq!(meta_path("/Orders"), "/Orders");
    }

    #[test]
    fn split_keep_alive_path_cases() {
        assert_eq!(
            split_keep_alive_path("/Orders(1)"),
            Some(KeepAlivePath {
                member: "/Orders(1)",
                relative: None,
            })
        );
        assert_eq!(
            split_keep_alive_path("/Orders(1)/_Customer"),
            Some(KeepAlivePath {
                member: "/Orders(1)",
                relative: Some("_Customer"),
            })
        );
        assert_eq!(
            split_keep_alive_path("/Orders(1)/_Items(2)/_Product"),
            Some(KeepAlivePath {
                member: "/Orders(1)/_Items(2)",
                relative: Some("_Product"),
            })
        );
        assert_eq!(split_keep_alive_path("/Singleton"), None);
        assert_eq!(split_keep_alive_path("/Orders(1)x"), None);
    }

    #[test]
    fn root_member_parsing() {
        assert_eq!(
            parse_root_member("/Orders(OrderNo='A-1')"),
            Some(RootMember {
                entity_set: "Orders",
                key_expression: "OrderNo='A-1'",
            })
        );
        assert!(parse_root_member("/Orders(1)/_Items(2)").is_none());
        assert!(parse_root_member("/Orders").is_none());
        assert!(parse_root_member("/Orders()").is_none());
    }
}
