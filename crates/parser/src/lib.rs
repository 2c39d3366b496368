//! Log line parsers. One text line in, one [`LogEntry`] out; parsers are
//! stateless after construction and safe to share across threads.

mod access_log;
mod json;

pub use access_log::{ApacheCombinedParser, CommonLogParser};
pub use json::JsonParser;

use logflow_core::{LogEntry, LogFlowResult};

/// Shared parsing contract for all supported log formats.
pub trait LogParser: Send + Sync {
    fn parse(&self, line: &str) -> LogFlowResult<LogEntry>;
}

/// Select a parser by format name. `apache` and `combined` are the same
/// format; anything unrecognized falls back to JSON.
pub fn for_format(format: &str) -> Box<dyn LogParser> {
    match format {
        "apache" | "combined" => Box::new(ApacheCombinedParser),
        "common" => Box::new(CommonLogParser),
        _ => Box::new(JsonParser),
    }
}
