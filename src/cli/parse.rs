use filingsum_core::pipeline::{FailurePolicy, Strategy};
use filingsum_core::summarizer::SummaryFocus;

/// Parse processing strategy from string
pub fn parse_strategy(s: &str) -> std::result::Result<Strategy, String> {
    s.parse::<Strategy>().map_err(|e| e.to_string())
}

/// Parse failure policy from string
pub fn parse_failure_policy(s: &str) -> std::result::Result<FailurePolicy, String> {
    s.parse::<FailurePolicy>().map_err(|e| e.to_string())
}

/// Parse summary focus from string
pub fn parse_focus(s: &str) -> std::result::Result<SummaryFocus, String> {
    s.parse::<SummaryFocus>().map_err(|e| e.to_string())
}
