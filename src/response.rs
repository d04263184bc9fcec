//! Envelopes wrapping payloads returned to API callers.

use serde::{Deserialize, Serialize};

use crate::{PagedResult, PagingMetaData};

/// Envelope around a single payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResponse<T> {
    pub code: Option<i32>,
    pub system_code: Option<String>,
    pub message: Option<String>,
    pub data: T,
}

impl<T> BaseResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: Some(200),
            system_code: None,
            message: None,
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Envelope without a payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub code: Option<i32>,
    pub system_code: Option<String>,
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            code: Some(200),
            ..Default::default()
        }
    }

    pub fn error(code: i32, system_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            system_code: Some(system_code.into()),
            message: Some(message.into()),
        }
    }
}

/// Envelope around a page of items.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicResponse<T> {
    pub code: Option<i32>,
    pub system_code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub meta_data: PagingMetaData,
    pub data: Vec<T>,
}

impl<T> DynamicResponse<T> {
    pub fn from_page(page: PagedResult<T>) -> Self {
        Self {
            code: Some(200),
            system_code: None,
            message: None,
            meta_data: page.meta_data,
            data: page.items,
        }
    }
}

impl<T> From<PagedResult<T>> for DynamicResponse<T> {
    fn from(page: PagedResult<T>) -> Self {
        Self::from_page(page)
    }
}
