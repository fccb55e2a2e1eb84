//! `tracing` 安装入口。
//!
//! 引擎内部只依赖 `tracing` 门面；宿主若没有自己的 Subscriber，可调用 [`install_tracing`]
//! 安装一个带 `EnvFilter` 的 `fmt` 输出。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 安装过程可能出现的错误。
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `install_tracing` 已成功执行过。
    #[error("navigation tracing is already installed")]
    AlreadyInstalled,
    /// 外部已经设置了全局 Subscriber。
    #[error("a global tracing subscriber has already been set")]
    SubscriberAlreadySet,
    /// 过滤指令无法解析。
    #[error("invalid log filter `{directive}`: {reason}")]
    InvalidFilter { directive: String, reason: String },
    /// 设置全局 Subscriber 失败。
    #[error("failed to set global subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 以 `directive`（如 `spark_navigation=debug`）安装全局 `fmt` Subscriber。
///
/// # 教案式说明
/// - **契约 (What)**：重复调用返回 [`TelemetryError::AlreadyInstalled`]；外部已设置 Subscriber 时
///   返回 [`TelemetryError::SubscriberAlreadySet`]；指令非法时不会触碰全局状态；
/// - **执行 (How)**：先解析过滤器，再组装 `fmt + EnvFilter` 并注册为全局默认。
pub fn install_tracing(directive: &str) -> Result<(), TelemetryError> {
    if INSTALLED.get().is_some() {
        return Err(TelemetryError::AlreadyInstalled);
    }
    let filter = EnvFilter::try_new(directive).map_err(|err| TelemetryError::InvalidFilter {
        directive: directive.to_owned(),
        reason: err.to_string(),
    })?;
    if dispatcher::has_been_set() {
        return Err(TelemetryError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    let _ = INSTALLED.set(());
    Ok(())
}
