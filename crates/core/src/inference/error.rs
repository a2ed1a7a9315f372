use std::fmt;

/// Inference failure carrying whatever the service returned, so a failed run
/// can be diagnosed from logs without replaying the call.
#[derive(Debug, Clone)]
pub struct InferenceDiagnosticsError {
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl fmt::Display for InferenceDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inference error (stage={}): {}", self.stage, self.detail)
    }
}

impl std::error::Error for InferenceDiagnosticsError {}
