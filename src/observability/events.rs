//! Observable search lifecycle events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events in a search's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Sessions
    /// A session was created for a search
    SessionStart,
    /// A search was started over
    SessionRestart,
    /// Queued requests were dropped by cancellation
    RequestsDiscarded,

    // Cursor
    /// A remote cursor was opened
    CursorOpen,
    /// Opening the remote cursor failed or timed out
    CursorOpenFailed,

    // Windows
    /// A window was fetched
    WindowFetch,
    /// A window fetch failed; queued requests received the error
    WindowFetchFailed,
    /// A short window marked the source exhausted
    SourceExhausted,

    // Usage
    /// Remaining usage dropped under the configured threshold
    UsageLow,

    // Facade
    /// A search definition was saved
    SearchSaved,
    /// A single-record lookup completed
    FieldsLookedUp,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SessionStart => "SESSION_START",
            Event::SessionRestart => "SESSION_RESTART",
            Event::RequestsDiscarded => "REQUESTS_DISCARDED",
            Event::CursorOpen => "CURSOR_OPEN",
            Event::CursorOpenFailed => "CURSOR_OPEN_FAILED",
            Event::WindowFetch => "WINDOW_FETCH",
            Event::WindowFetchFailed => "WINDOW_FETCH_FAILED",
            Event::SourceExhausted => "SOURCE_EXHAUSTED",
            Event::UsageLow => "USAGE_LOW",
            Event::SearchSaved => "SEARCH_SAVED",
            Event::FieldsLookedUp => "FIELDS_LOOKED_UP",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::WindowFetch | Event::FieldsLookedUp => Severity::Trace,
            Event::UsageLow | Event::RequestsDiscarded => Severity::Warn,
            Event::CursorOpenFailed | Event::WindowFetchFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::WindowFetch.as_str(), "WINDOW_FETCH");
        assert_eq!(Event::SourceExhausted.to_string(), "SOURCE_EXHAUSTED");
    }

    #[test]
    fn test_failures_are_errors() {
        assert_eq!(Event::WindowFetchFailed.severity(), Severity::Error);
        assert_eq!(Event::CursorOpenFailed.severity(), Severity::Error);
        assert_eq!(Event::WindowFetch.severity(), Severity::Trace);
        assert_eq!(Event::SessionStart.severity(), Severity::Info);
    }
}
