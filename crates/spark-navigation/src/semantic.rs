//! # 语义路径解析
//!
//! ## 核心意图（Why）
//! - 书签与分享链接可能使用人类可读的键（订单号）而非技术主键；解析器把 `/Orders(OrderNo='A-1')`
//!   换成 `/Orders(10001)`，以便后续绑定命中真实实体；
//! - 语义书签只是便利功能：任何一步失败都退回“按原路径使用”，不会向用户暴露。
//!
//! ## 行为概览（How）
//! 1. 资格判断：单段根路径、实体启用草稿、声明了非空语义键；
//! 2. 查单槽缓存 [`SemanticCache`]，命中则直接返回；
//! 3. 解析括号内的键值赋值并构造过滤器（语义键相等 AND 草稿消歧）；
//! 4. 查询集合的前 `lookup_page_size` 条匹配，取第一条的技术路径；
//! 5. 得到不同于输入的技术路径时覆盖缓存。
//!
//! ## 并发约束（What）
//! - 缓存是可注入的共享对象，只有解析器写入；同一语义路径的重复导航走同步缓存命中，
//!   从而避开大部分竞态。

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::SemanticSettings;
use crate::data::{CollectionQuery, DataModel};
use crate::filter::Filter;
use crate::path::parse_root_member;

/// 语义路径与技术路径的映射。
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SemanticMapping {
    pub semantic_path: String,
    pub technical_path: String,
}

/// 单槽解析缓存：任意时刻至多一个条目，每次成功解析覆盖。
#[derive(Debug, Default)]
pub struct SemanticCache {
    slot: Mutex<Option<SemanticMapping>>,
}

impl SemanticCache {
    /// 创建空缓存。
    pub fn new() -> Self {
        Self::default()
    }

    /// 语义路径与缓存条目完全一致时返回技术路径。
    pub fn get(&self, semantic_path: &str) -> Option<String> {
        self.slot
            .lock()
            .as_ref()
            .filter(|mapping| mapping.semantic_path == semantic_path)
            .map(|mapping| mapping.technical_path.clone())
    }

    /// 覆盖唯一的缓存条目。
    pub fn put(&self, semantic_path: impl Into<String>, technical_path: impl Into<String>) {
        *self.slot.lock() = Some(SemanticMapping {
            semantic_path: semantic_path.into(),
            technical_path: technical_path.into(),
        });
    }

    /// 当前缓存条目的副本。
    pub fn snapshot(&self) -> Option<SemanticMapping> {
        self.slot.lock().clone()
    }

    /// 清空缓存。
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

/// 语义路径解析器。
pub struct SemanticPathResolver {
    model: Arc<dyn DataModel>,
    cache: Arc<SemanticCache>,
    settings: SemanticSettings,
}

impl SemanticPathResolver {
    /// 以数据模型、共享缓存与配置构造解析器。
    pub fn new(
        model: Arc<dyn DataModel>,
        cache: Arc<SemanticCache>,
        settings: SemanticSettings,
    ) -> Self {
        Self {
            model,
            cache,
            settings,
        }
    }

    /// 注入的共享缓存。
    pub fn cache(&self) -> &Arc<SemanticCache> {
        &self.cache
    }

    /// 把候选路径解析为技术路径。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：永不失败；不具备资格、键数量不匹配、查询无结果或查询出错时返回原路径；
    /// - **执行 (How)**：不具备资格的路径与缓存命中都在第一次 `poll` 时就绪，不产生挂起。
    pub async fn resolve(&self, candidate: &str) -> String {
        let Some(plan) = self.plan(candidate) else {
            return candidate.to_owned();
        };

        if let Some(technical) = self.cache.get(candidate) {
            debug!(semantic = candidate, technical = %technical, "semantic path served from cache");
            return technical;
        }

        let Some(query) = plan else {
            debug!(path = candidate, "semantic key values do not match declared keys");
            return candidate.to_owned();
        };

        let technical = match self.model.request_contexts(&query).await {
            Ok(paths) => paths.into_iter().next(),
            Err(err) => {
                warn!(path = candidate, error = %err, "semantic path lookup failed; using path as given");
                return candidate.to_owned();
            }
        };

        match technical {
            Some(technical) if technical != candidate => {
                debug!(semantic = candidate, technical = %technical, "semantic path resolved");
                self.cache.put(candidate, technical.clone());
                technical
            }
            _ => {
                debug!(path = candidate, "no entity matches semantic path");
                candidate.to_owned()
            }
        }
    }

    /// 外层 `None` 表示不具备资格；内层 `None` 表示具备资格但键值无法构造过滤器。
    fn plan(&self, candidate: &str) -> Option<Option<CollectionQuery>> {
        let member = parse_root_member(candidate)?;
        let collection = format!("/{}", member.entity_set);
        let metadata = self.model.entity_metadata(&collection)?;
        if !metadata.is_draft_enabled() || metadata.semantic_keys.is_empty() {
            return None;
        }

        let query = extract_key_values(member.key_expression, &metadata.semantic_keys).map(
            |values| CollectionQuery {
                filter: Filter::semantic_lookup(
                    values.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                    self.model.is_filtering_case_sensitive(),
                ),
                collection,
                top: self.settings.lookup_page_size,
                group_id: self.settings.group_id.clone(),
            },
        );
        Some(query)
    }
}

/// 按声明顺序提取语义键取值。
///
/// # 教案式注释
/// - **契约 (What)**：
///   - 单个语义键时接受未命名取值（`'A-1'`），也接受以该键命名的赋值（`OrderNo='A-1'`）；
///     以其他名称命名的赋值（`Other='x'`）视为缺少该键；
///   - 多个语义键时要求 `name=value` 形式，顺序无关；
///   - 赋值数量与语义键数量不一致、缺少某个键或取值无法解码时返回 `None`；
///   - 单引号包裹的取值去掉引号并做百分号解码。
pub fn extract_key_values(
    key_expression: &str,
    semantic_keys: &[String],
) -> Option<Vec<(String, String)>> {
    let assignments = split_assignments(key_expression);
    if assignments.len() != semantic_keys.len() {
        return None;
    }

    if let [key] = semantic_keys {
        let raw = match assignments[0].split_once('=') {
            Some((name, value)) if name.trim() == key => value,
            Some((name, _)) if is_identifier(name.trim()) => return None,
            _ => assignments[0],
        };
        return Some(vec![(key.clone(), unquote_and_decode(raw)?)]);
    }

    let named: Vec<(&str, &str)> = assignments
        .iter()
        .map(|assignment| {
            assignment
                .split_once('=')
                .map(|(name, value)| (name.trim(), value))
        })
        .collect::<Option<_>>()?;

    semantic_keys
        .iter()
        .map(|key| {
            let (_, raw) = named.iter().find(|(name, _)| name == key)?;
            Some((key.clone(), unquote_and_decode(raw)?))
        })
        .collect()
}

/// 未加引号的属性名；带引号的左侧属于未命名取值本身（如 `'a=b'`）。
fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|ch| ch.is_alphanumeric() || ch == '_')
}

/// 以逗号切分键赋值，单引号内的逗号不切分。
fn split_assignments(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (index, ch) in expression.char_indices() {
        match ch {
            '\'' => quoted = !quoted,
            ',' if !quoted => {
                parts.push(&expression[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}

fn unquote_and_decode(raw: &str) -> Option<String> {
    let raw = raw.trim();
    match raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(inner) => urlencoding::decode(inner).ok().map(|value| value.into_owned()),
        None => Some(raw.to_owned()),
    }
}
