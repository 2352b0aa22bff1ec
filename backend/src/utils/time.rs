use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Converts a stored UTC timestamp into the configured timezone.
pub fn to_local(at: DateTime<Utc>, tz: &Tz) -> DateTime<Tz> {
    at.with_timezone(tz)
}

/// Formats a timestamp for humans, e.g. in notification mails.
pub fn format_local(at: DateTime<Utc>, tz: &Tz) -> String {
    to_local(at, tz).format("%Y-%m-%d %H:%M %Z").to_string()
}
