//! # keep-alive 授予与释放
//!
//! ## 核心意图（Why）
//! - 多列布局下，同一实体可能同时显示在多列中；keep-alive 上下文的生命周期独立于任何单个页面，
//!   真实持有者是数据层，页面只借用；
//! - 授予与释放都在单个绑定周期内同步完成，不存在并发修改 keep-alive 标志的情况。
//!
//! ## 不变量（What）
//! - keep-alive 只能授予集合成员路径（以 `)` 结尾）；其他路径返回
//!   [`BindingError::KeepAliveRejected`]，绝不静默创建；
//! - 页面替换绑定上下文时，旧上下文若处于 keep-alive 且与新上下文不是同一实例，显式清除标志。

use tracing::{debug, warn};

use crate::data::{BeforeDestroy, ContextRef, same_context};
use crate::error::BindingError;
use crate::path::is_collection_member;

/// 为上下文授予 keep-alive。
///
/// # 教案式注释
/// - **契约 (What)**：
///   - `on_before_destroy` 在数据层真正销毁上下文前调用；
///   - `request_messages` 表示实体声明了消息集合，保活期间需要一并请求消息；
///   - 路径不是集合成员时返回 [`BindingError::KeepAliveRejected`]；数据层拒绝时返回
///     [`BindingError::Data`]。
pub fn grant(
    context: &ContextRef,
    on_before_destroy: BeforeDestroy,
    request_messages: bool,
) -> Result<(), BindingError> {
    let path = context.path();
    if !is_collection_member(&path) {
        return Err(BindingError::KeepAliveRejected { path });
    }
    context
        .set_keep_alive(true, Some(on_before_destroy), request_messages)
        .map_err(BindingError::data("granting keep-alive"))?;
    debug!(path = %path, "keep-alive granted");
    Ok(())
}

/// 在上下文替换时释放旧上下文的 keep-alive，返回是否执行了释放。
pub fn release(previous: Option<&ContextRef>, next: Option<&ContextRef>) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    if !previous.is_keep_alive() || next.is_some_and(|next| same_context(previous, next)) {
        return false;
    }
    match previous.set_keep_alive(false, None, false) {
        Ok(()) => debug!(path = %previous.path(), "keep-alive released"),
        Err(err) => warn!(path = %previous.path(), error = %err, "failed to release keep-alive"),
    }
    true
}
