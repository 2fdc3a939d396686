//! Limit builder
//!
//! Validates the page size and asks storage for one extra row so a
//! further page can be detected without a second round trip.

use super::query::{QueryBuilder, SqlQuery};
use crate::config::QueryConfig;
use crate::errors::{QueryError, QueryResult};

/// Accepted page size band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizeLimits {
    pub min: i32,
    pub max: i32,
    /// Used when the request asks for 0 and 0 is inside the band
    pub default: i32,
}

impl Default for PageSizeLimits {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

impl PageSizeLimits {
    pub fn from_config(config: &QueryConfig) -> Self {
        Self {
            min: config.min_page_size,
            max: config.max_page_size,
            default: config.default_page_size,
        }
    }

    /// Validate `requested` and map 0 to the default
    pub fn resolve(&self, requested: i32) -> QueryResult<i32> {
        if requested < self.min || requested > self.max {
            return Err(QueryError::InvalidPageSize {
                size: requested,
                min: self.min,
                max: self.max,
            });
        }
        Ok(if requested == 0 { self.default } else { requested })
    }
}

/// `LIMIT page_size + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    page_size: i32,
}

impl Limit {
    pub fn new(limits: &PageSizeLimits, requested: i32) -> QueryResult<Self> {
        Ok(Self {
            page_size: limits.resolve(requested)?,
        })
    }

    pub fn page_size(&self) -> usize {
        usize::try_from(self.page_size).unwrap_or(0)
    }
}

impl QueryBuilder for Limit {
    fn build(&self, query: &mut SqlQuery) -> QueryResult<()> {
        query.limit = Some(i64::from(self.page_size) + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> PageSizeLimits {
        PageSizeLimits {
            min: 5,
            max: 100,
            default: 20,
        }
    }

    #[test]
    fn test_band_edges() {
        let l = limits();
        assert!(l.resolve(4).is_err());
        assert_eq!(l.resolve(5).unwrap(), 5);
        assert_eq!(l.resolve(100).unwrap(), 100);
        assert!(matches!(
            l.resolve(101),
            Err(QueryError::InvalidPageSize { size: 101, min: 5, max: 100 })
        ));
    }

    #[test]
    fn test_zero_means_default() {
        let l = PageSizeLimits::default();
        assert_eq!(l.resolve(0).unwrap(), 50);
        assert!(l.resolve(-1).is_err());
    }

    #[test]
    fn test_requests_one_extra_row() {
        let limit = Limit::new(&limits(), 10).unwrap();
        let mut query = SqlQuery::new("records");
        query.apply(&limit).unwrap();
        assert_eq!(query.limit, Some(11));
        assert_eq!(limit.page_size(), 10);
    }
}
