//! A wall-clock capability, injected into the engine so tests can pin
//! `valid_from`/`valid_to` defaults instead of racing the system clock.

use chrono::{SecondsFormat, Utc};

/// The default `valid_to` for a freshly written row version: open-ended,
/// per §3.
pub const DEFAULT_VALID_TO: &str = "9999-12-31T23:59:59Z";

pub trait TimeSource: Send + Sync {
    fn now_iso8601(&self) -> String;
}

/// Stamps rows with the real process wall clock, in ISO-8601 UTC.
#[derive(Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_iso8601(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Returns a fixed timestamp on every call, for deterministic tests.
#[derive(Clone)]
pub struct FixedTimeSource(pub String);

impl TimeSource for FixedTimeSource {
    fn now_iso8601(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_time_source_is_stable() {
        let ts = FixedTimeSource("2026-01-01T00:00:00Z".to_string());
        assert_eq!(ts.now_iso8601(), ts.now_iso8601());
    }
}
