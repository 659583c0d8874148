//! Query and ingestion parameters with their defaults
//!
//! Hosts that receive signed integers (query strings, JSON) go through the
//! `from_signed` constructors, which reject negative values before the store
//! is touched.

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_WINDOW_SIZE: u64 = 1;

/// Limit/offset slice of an ordered result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// `None` returns everything after `offset`
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: Some(DEFAULT_LIMIT),
            offset: 0,
        }
    }
}

impl Page {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            limit: None,
            offset: 0,
        }
    }

    /// Missing values fall back to `Page::default()`
    pub fn from_signed(limit: Option<i64>, offset: Option<i64>) -> EngineResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            limit: match limit {
                Some(limit) => Some(non_negative("limit", limit)?),
                None => defaults.limit,
            },
            offset: offset
                .map(|offset| non_negative("offset", offset))
                .transpose()?
                .unwrap_or(defaults.offset),
        })
    }
}

/// Participant neighborhood lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionQuery {
    pub address: String,
    pub window_size: u64,
    pub page: Page,
    pub normalize_addresses: bool,
}

impl PositionQuery {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            window_size: DEFAULT_WINDOW_SIZE,
            page: Page::default(),
            normalize_addresses: true,
        }
    }

    pub fn window(mut self, window_size: u64) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn normalize(mut self, normalize_addresses: bool) -> Self {
        self.normalize_addresses = normalize_addresses;
        self
    }

    pub fn from_signed(
        address: impl Into<String>,
        window_size: i64,
        limit: i64,
        offset: i64,
        normalize_addresses: bool,
    ) -> EngineResult<Self> {
        Ok(Self {
            address: address.into(),
            window_size: non_negative("window_size", window_size)?,
            page: Page::new(non_negative("limit", limit)?, non_negative("offset", offset)?),
            normalize_addresses,
        })
    }
}

/// Bulk score push options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub overwrite: bool,
    pub normalize_addresses: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            normalize_addresses: true,
        }
    }
}

impl IngestOptions {
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    pub fn merge() -> Self {
        Self::default()
    }

    pub fn normalize(mut self, normalize_addresses: bool) -> Self {
        self.normalize_addresses = normalize_addresses;
        self
    }
}

/// Reject negative values with a validation error naming the parameter
pub fn non_negative(name: &str, value: i64) -> EngineResult<u64> {
    u64::try_from(value)
        .map_err(|_| {
            EngineError::Validation(format!("{} must be non-negative, got {}", name, value))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let query = PositionQuery::new("0xabc");
        assert_eq!(query.window_size, 1);
        assert_eq!(query.page, Page::new(10, 0));
        assert!(query.normalize_addresses);

        assert_eq!(IngestOptions::default(), IngestOptions::merge());
        assert!(IngestOptions::overwrite().overwrite);
    }

    #[test]
    fn test_negative_parameters_rejected() {
        let err = PositionQuery::from_signed("0xabc", -1, 10, 0, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("window_size"));

        let err = Page::from_signed(Some(5), Some(-3)).unwrap_err();
        assert!(err.to_string().contains("offset"));
    }

    #[test]
    fn test_page_from_signed_uses_defaults() {
        assert_eq!(Page::from_signed(None, None).unwrap(), Page::default());
        assert_eq!(Page::from_signed(Some(0), Some(4)).unwrap(), Page::new(0, 4));
    }
}
