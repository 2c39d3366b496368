//! Apache access-log parsers. The Combined format is the Common format plus
//! referer and user-agent fields; both share timestamp handling and the
//! status-derived log level.

use crate::LogParser;
use chrono::{DateTime, Utc};
use logflow_core::{LogEntry, LogFlowError, LogFlowResult};
use once_cell::sync::Lazy;
use regex::Regex;

// Compiled once per process; parser construction must never recompile.
static COMBINED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) (\S+) \S+" (\d+) (\S+) "([^"]*)" "([^"]*)""#)
        .expect("combined log pattern is valid")
});

static COMMON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) (\S+) \S+" (\d+) (\S+)"#)
        .expect("common log pattern is valid")
});

const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Parses the Apache Combined Log Format:
/// `%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-agent}i"`.
pub struct ApacheCombinedParser;

impl LogParser for ApacheCombinedParser {
    fn parse(&self, line: &str) -> LogFlowResult<LogEntry> {
        let caps = COMBINED_RE
            .captures(line)
            .ok_or_else(|| LogFlowError::Parse("invalid Apache log format".into()))?;

        let mut entry = entry_from_request_fields(
            line,
            &caps[2],
            &caps[1],
            &caps[3],
            &caps[4],
            &caps[5],
        );
        entry.user_agent = caps[8].to_string();
        Ok(entry)
    }
}

/// Parses the Common Log Format: `%h %l %u %t "%r" %>s %b`.
pub struct CommonLogParser;

impl LogParser for CommonLogParser {
    fn parse(&self, line: &str) -> LogFlowResult<LogEntry> {
        let caps = COMMON_RE
            .captures(line)
            .ok_or_else(|| LogFlowError::Parse("invalid Common log format".into()))?;

        Ok(entry_from_request_fields(
            line,
            &caps[2],
            &caps[1],
            &caps[3],
            &caps[4],
            &caps[5],
        ))
    }
}

fn entry_from_request_fields(
    line: &str,
    timestamp: &str,
    ip_address: &str,
    method: &str,
    path: &str,
    status: &str,
) -> LogEntry {
    // An unparseable timestamp is substituted with the wall clock rather than
    // failing the whole line.
    let timestamp = DateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    let status_code: u16 = status.parse().unwrap_or(0);

    LogEntry {
        timestamp,
        level: level_for_status(status_code).to_string(),
        message: line.to_string(),
        ip_address: ip_address.to_string(),
        method: method.to_string(),
        path: path.to_string(),
        status_code,
        ..LogEntry::default()
    }
}

fn level_for_status(status_code: u16) -> &'static str {
    if status_code >= 500 {
        "error"
    } else if status_code >= 400 {
        "warn"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const COMBINED_LINE: &str = r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "http://www.example.com/start.html" "Mozilla/4.08 [en] (Win98; I ;Nav)""#;

    #[test]
    fn test_combined_line_fields() {
        let entry = ApacheCombinedParser.parse(COMBINED_LINE).unwrap();
        assert_eq!(entry.ip_address, "127.0.0.1");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/apache_pb.gif");
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.user_agent, "Mozilla/4.08 [en] (Win98; I ;Nav)");
        assert_eq!(entry.level, "info");
        assert_eq!(entry.message, COMBINED_LINE);

        let expected = Utc.with_ymd_and_hms(2000, 10, 10, 20, 55, 36).unwrap();
        assert_eq!(entry.timestamp, expected);
    }

    #[test]
    fn test_common_line_has_no_user_agent() {
        let line = r#"10.0.0.5 - - [10/Oct/2000:13:55:36 -0700] "POST /login HTTP/1.1" 401 199"#;
        let entry = CommonLogParser.parse(line).unwrap();
        assert_eq!(entry.ip_address, "10.0.0.5");
        assert_eq!(entry.status_code, 401);
        assert!(entry.user_agent.is_empty());
    }

    #[test]
    fn test_level_derived_from_status_code() {
        for (status, level) in [(200, "info"), (301, "info"), (404, "warn"), (503, "error")] {
            let line = format!(
                r#"1.2.3.4 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" {status} 1 "-" "ua""#
            );
            let entry = ApacheCombinedParser.parse(&line).unwrap();
            assert_eq!(entry.level, level, "status {status}");
        }
    }

    #[test]
    fn test_bad_timestamp_falls_back_to_now() {
        let line = r#"1.2.3.4 - - [not a timestamp] "GET / HTTP/1.1" 200 1 "-" "ua""#;
        let before = Utc::now();
        let entry = ApacheCombinedParser.parse(line).unwrap();
        assert!(entry.timestamp >= before);
    }

    #[test]
    fn test_garbage_line_is_rejected() {
        assert!(ApacheCombinedParser.parse("garbage").is_err());
        assert!(CommonLogParser.parse("garbage").is_err());
    }
}
