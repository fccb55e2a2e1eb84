//! # 集合查询过滤器
//!
//! 语义路径解析需要向数据层下发“语义键相等 且 草稿消歧”的过滤条件。这里只建模引擎真正用到的
//! 相等比较与 AND/OR 组合；[`Filter`] 的 `Display` 输出 OData 风格的 `$filter` 表达式，
//! 供日志与需要文本形式的数据层使用。

use std::fmt;

/// 过滤条件中的取值。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FilterValue {
    Text(String),
    Bool(bool),
    Null,
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            FilterValue::Bool(flag) => write!(f, "{flag}"),
            FilterValue::Null => f.write_str("null"),
        }
    }
}

/// 单个相等比较。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Condition {
    /// 属性路径，可以跨导航（`SiblingEntity/IsActiveEntity`）。
    pub path: String,
    pub value: FilterValue,
    /// 文本比较是否区分大小写；对非文本取值无意义。
    pub case_sensitive: bool,
}

/// 过滤器树。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Filter {
    Equals(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// 构造区分大小写的相等比较。
    pub fn equals(path: impl Into<String>, value: FilterValue) -> Self {
        Filter::Equals(Condition {
            path: path.into(),
            value,
            case_sensitive: true,
        })
    }

    /// 构造文本相等比较，大小写敏感性由调用方决定。
    pub fn text_equals(
        path: impl Into<String>,
        value: impl Into<String>,
        case_sensitive: bool,
    ) -> Self {
        Filter::Equals(Condition {
            path: path.into(),
            value: FilterValue::Text(value.into()),
            case_sensitive,
        })
    }

    /// 草稿消歧条件：`IsActiveEntity = false` 或 `SiblingEntity/IsActiveEntity` 为空。
    ///
    /// 存在草稿时优先命中草稿，否则回退到激活版本。
    pub fn draft_disambiguation() -> Self {
        Filter::Or(vec![
            Filter::equals("IsActiveEntity", FilterValue::Bool(false)),
            Filter::equals("SiblingEntity/IsActiveEntity", FilterValue::Null),
        ])
    }

    /// 语义键查询过滤器：所有键值相等条件取 AND，再与草稿消歧条件取 AND。
    pub fn semantic_lookup<'a, I>(key_values: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let keys = key_values
            .into_iter()
            .map(|(key, value)| Filter::text_equals(key, value, case_sensitive))
            .collect();
        Filter::And(vec![Filter::And(keys), Filter::draft_disambiguation()])
    }

    /// 深度优先展开所有叶子条件。
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Filter::Equals(condition) => out.push(condition),
            Filter::And(filters) | Filter::Or(filters) => {
                for filter in filters {
                    filter.collect_conditions(out);
                }
            }
        }
    }

    fn write_group(f: &mut fmt::Formatter<'_>, filters: &[Filter], op: &str) -> fmt::Result {
        for (index, filter) in filters.iter().enumerate() {
            if index > 0 {
                write!(f, " {op} ")?;
            }
            match filter {
                Filter::Equals(_) => write!(f, "{filter}")?,
                _ => write!(f, "({filter})")?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equals(Condition {
                path,
                value: value @ FilterValue::Text(_),
                case_sensitive: false,
            }) => write!(f, "tolower({path}) eq tolower({value})"),
            Filter::Equals(Condition { path, value, .. }) => write!(f, "{path} eq {value}"),
            Filter::And(filters) => Filter::write_group(f, filters, "and"),
            Filter::Or(filters) => Filter::write_group(f, filters, "or"),
        }
    }
}
