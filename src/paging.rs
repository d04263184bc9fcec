use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 1000;

fn default_page() -> u32 {
    DEFAULT_PAGE
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    /// Reads `asc`/`ascending` or `desc`/`descending` in any case.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Self::Ascending),
            "desc" | "descending" => Some(Self::Descending),
            _ => None,
        }
    }
}

/// Unrecognised directions leave the order unset instead of failing the
/// whole request.
fn lenient_direction<'de, D>(deserializer: D) -> Result<Option<SortDirection>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(SortDirection::parse))
}

/// Paging request accepted by list operations.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingModel {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_direction",
        skip_serializing_if = "Option::is_none"
    )]
    pub order: Option<SortDirection>,
}

impl Default for PagingModel {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
            sort: None,
            order: None,
        }
    }
}

impl PagingModel {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            ..Default::default()
        }
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortDirection) -> Self {
        self.sort = Some(field.into());
        self.order = Some(order);
        self
    }

    /// Pages start at 1; sizes are kept within `1..=MAX_PAGE_SIZE`.
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            size: self.size.clamp(1, MAX_PAGE_SIZE),
            sort: self.sort.clone(),
            order: self.order,
        }
    }

    /// Rows to skip before this page, assuming a normalized model.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingMetaData {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
    #[serde(default)]
    pub total: u64,
}

impl Default for PagingMetaData {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
            total: 0,
        }
    }
}

impl PagingMetaData {
    pub fn new(paging: &PagingModel, total: u64) -> Self {
        let paging = paging.normalized();
        Self {
            page: paging.page,
            size: paging.size,
            total,
        }
    }
}

/// One page of a list query.
#[derive(Clone, Debug, PartialEq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub meta_data: PagingMetaData,
}

impl<T> PagedResult<T> {
    pub fn total_pages(&self) -> u64 {
        self.meta_data.total.div_ceil(u64::from(self.meta_data.size.max(1)))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            meta_data: self.meta_data,
        }
    }
}
