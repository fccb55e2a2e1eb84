//! 数据错误到错误页文案的映射。

use super::collaborators::ErrorPageParameters;
use crate::error::{DataError, DataErrorCategory};

pub(crate) const ERROR_TITLE: &str = "Error";
pub(crate) const DATA_RECEIVED_ERROR: &str = "The data for this page could not be loaded.";
pub(crate) const GENERIC_DATA_ERROR: &str =
    "The request could not be processed. Try again or contact your administrator.";

/// 一次错误页展示请求。
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ErrorPage {
    pub message: String,
    pub parameters: ErrorPageParameters,
}

/// 按状态码挑选错误页文案：400 不暴露原始错误文本，503 额外提供“返回外壳”入口。
pub(crate) fn for_data_error(error: &DataError, fcl_level: u32) -> ErrorPage {
    let (description, shell_back) = match error.category() {
        DataErrorCategory::ServiceUnavailable => (error.message.clone(), true),
        DataErrorCategory::BadRequest => (GENERIC_DATA_ERROR.to_owned(), false),
        DataErrorCategory::Uncategorized => (error.message.clone(), false),
    };
    ErrorPage {
        message: DATA_RECEIVED_ERROR.to_owned(),
        parameters: ErrorPageParameters {
            title: ERROR_TITLE.to_owned(),
            description,
            fcl_level,
            shell_back,
        },
    }
}
