//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义导航绑定引擎对外暴露的错误语义，明确区分“可回退”“页面级”“致命”三类；
//! - 数据访问协作方的失败统一包装为 [`DataError`]，附带可选的 HTTP 等价状态码。
//!
//! ## 分类约定（What）
//! - **Recoverable**：语义解析、副作用刷新、keep-alive 授予被拒等，记录日志后继续；
//! - **PageLevel**：构造新绑定时的元数据/查询失败，由绑定器转交错误页展示；
//! - **Fatal**：配置缺陷（例如无法表达为集合成员前缀的 keep-alive 路径），原样向调用方传播。

use thiserror::Error;

/// 错误在绑定周期中的处置方式。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    /// 记录日志并回退，不打扰用户。
    Recoverable,
    /// 转换为错误页展示。
    PageLevel,
    /// 配置缺陷，直接返回给路由命中处理方。
    Fatal,
}

/// 数据层错误按状态码归类后的语义。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DataErrorCategory {
    /// 503：服务暂不可用，错误页需提供“返回外壳”入口。
    ServiceUnavailable,
    /// 400：请求非法，只展示通用数据错误文案，不泄露原始错误文本。
    BadRequest,
    /// 其余状态或无状态码：展示原始错误文本。
    Uncategorized,
}

/// 数据访问协作方返回的错误。
///
/// # 教案式说明
/// - **意图 (Why)**：数据层可能来自任意传输实现，这里只保留引擎做决策所需的最小信息；
/// - **契约 (What)**：`status` 为 HTTP 等价状态码（若有），`message` 为人类可读的原始描述；
/// - **风险 (Trade-offs)**：原始描述可能包含服务端细节，仅在 [`DataErrorCategory::Uncategorized`] 时展示。
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("{message}")]
pub struct DataError {
    /// HTTP 等价状态码。
    pub status: Option<u16>,
    /// 原始错误描述。
    pub message: String,
}

impl DataError {
    /// 构造不带状态码的数据错误。
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// 构造携带状态码的数据错误。
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// 按状态码归类。
    pub fn category(&self) -> DataErrorCategory {
        match self.status {
            Some(503) => DataErrorCategory::ServiceUnavailable,
            Some(400) => DataErrorCategory::BadRequest,
            _ => DataErrorCategory::Uncategorized,
        }
    }
}

/// 导航绑定引擎的统一错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：绑定周期中所有失败路径都落到同一个枚举，调用方只需通过 [`BindingError::class`]
///   决定是回退、展示错误页还是直接失败；
/// - **契约 (What)**：所有变体满足 `Send + Sync + 'static`，可以跨 `.await` 传播；
/// - **执行 (How)**：数据层失败通过 `Data`/`SideEffects` 保留原始 [`DataError`]，供错误页按状态码挑选文案。
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum BindingError {
    /// 构造或获取上下文时数据层失败。
    #[error("data access failed while {operation}: {source}")]
    Data {
        operation: &'static str,
        #[source]
        source: DataError,
    },

    /// 请求的路径无法拆分为“集合成员前缀 + 相对后缀”，无法建立 keep-alive 上下文。
    #[error("cannot create keep-alive context for `{path}`: no collection-member prefix")]
    KeepAliveUnavailable { path: String },

    /// 在非集合成员路径上申请 keep-alive。
    #[error("keep-alive requested for `{path}`, which does not denote a collection member")]
    KeepAliveRejected { path: String },

    /// 副作用刷新失败。
    #[error("side effects refresh for `{path}` failed: {source}")]
    SideEffects {
        path: String,
        #[source]
        source: DataError,
    },

    /// 引擎配置无法解析或取值非法。
    #[error("invalid navigation settings: {detail}")]
    Configuration { detail: String },
}

impl BindingError {
    /// 返回错误的处置类别。
    pub fn class(&self) -> ErrorClass {
        match self {
            BindingError::Data { .. } => ErrorClass::PageLevel,
            BindingError::KeepAliveRejected { .. } | BindingError::SideEffects { .. } => {
                ErrorClass::Recoverable
            }
            BindingError::KeepAliveUnavailable { .. } | BindingError::Configuration { .. } => {
                ErrorClass::Fatal
            }
        }
    }

    /// 若错误源自数据层，返回原始 [`DataError`]。
    pub fn data_error(&self) -> Option<&DataError> {
        match self {
            BindingError::Data { source, .. } | BindingError::SideEffects { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    pub(crate) fn data(operation: &'static str) -> impl FnOnce(DataError) -> Self {
        move |source| BindingError::Data { operation, source }
    }
}
