use crate::LogParser;
use logflow_core::{LogEntry, LogFlowError, LogFlowResult};

/// Parses one JSON object per line directly into the [`LogEntry`] schema.
/// Missing optional fields take their zero values.
pub struct JsonParser;

impl LogParser for JsonParser {
    fn parse(&self, line: &str) -> LogFlowResult<LogEntry> {
        serde_json::from_str(line)
            .map_err(|e| LogFlowError::Parse(format!("failed to parse JSON log: {e}")))
    }
}
