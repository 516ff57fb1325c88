use ::time::OffsetDateTime;
use ::time::format_description::well_known::Rfc3339;

/// Current UTC time as an RFC 3339 string.
pub fn now_iso8601() -> String {
    format_iso8601(OffsetDateTime::now_utc())
}

/// Format a timestamp as RFC 3339 in UTC.
pub fn format_iso8601(ts: OffsetDateTime) -> String {
    ts.to_offset(::time::UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// Parse an RFC 3339 timestamp.
pub fn parse_iso8601(raw: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).ok()
}

/// Convert stored Unix seconds back to a UTC timestamp.
pub fn from_unix(seconds: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(seconds).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
