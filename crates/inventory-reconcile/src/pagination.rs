//! Page selection for list queries.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based.
    pub page: u64,
    pub size: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Non-positive values fall back to the defaults; sizes are clamped.
    pub fn new(page: Option<i64>, size: Option<i64>) -> Self {
        let defaults = Self::default();
        let page = page
            .filter(|p| *p > 0)
            .map_or(defaults.page, |p| p as u64);
        let size = size
            .filter(|s| *s > 0)
            .map_or(defaults.size, |s| (s as u64).min(MAX_PAGE_SIZE));
        Self { page, size }
    }

    /// Lenient parse of raw query parameters; garbage is ignored.
    pub fn from_query(page: Option<&str>, size: Option<&str>) -> Self {
        let parse = |v: Option<&str>| v.and_then(|v| v.trim().parse::<i64>().ok());
        Self::new(parse(page), parse(size))
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }
}

/// One page of results. `size` is the number of items returned and
/// `total` the count across all pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub page: u64,
    pub size: usize,
    pub total: u64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            page: self.page,
            size: self.size,
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
