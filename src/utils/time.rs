//! Clock formatting for elapsed and remaining recording time.

/// Format a number of seconds as `mm:ss`.
///
/// Minutes are not wrapped into hours; anything at or above 100 minutes
/// simply grows the minute field.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Format a remaining-time value for a countdown display.
pub fn format_countdown(seconds: u64) -> String {
    format_clock(seconds)
}
