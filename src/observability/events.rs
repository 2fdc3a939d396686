//! Observable query-layer events

use std::fmt;

use super::logger::Severity;

/// Events the query layer reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration loaded
    ConfigLoaded,

    // Filters
    /// Filter translated to SQL
    FilterCompiled,
    /// Filter failed to parse, check or translate
    FilterRejected,

    // Listing
    /// A page was listed
    PageListed,
    /// A page token failed to decode or did not match its request
    PageTokenRejected,

    // Aggregation
    /// Summary query executed
    SummaryComputed,

    /// Storage collaborator returned an error
    StorageFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::FilterCompiled => "FILTER_COMPILED",
            Event::FilterRejected => "FILTER_REJECTED",
            Event::PageListed => "PAGE_LISTED",
            Event::PageTokenRejected => "PAGE_TOKEN_REJECTED",
            Event::SummaryComputed => "SUMMARY_COMPUTED",
            Event::StorageFailed => "STORAGE_FAILED",
        }
    }

    /// Severity the event is logged at.
    ///
    /// `FilterCompiled` carries generated SQL and is only emitted when
    /// query logging lowers the threshold to TRACE.
    pub fn severity(&self) -> Severity {
        match self {
            Event::FilterCompiled => Severity::Trace,
            Event::ConfigLoaded | Event::PageListed | Event::SummaryComputed => Severity::Info,
            Event::FilterRejected | Event::PageTokenRejected => Severity::Warn,
            Event::StorageFailed => Severity::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
