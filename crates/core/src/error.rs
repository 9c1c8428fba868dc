use serde::{Deserialize, Serialize};

/// Error kinds surfaced in `slot.error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimit,
    ServerError,
    TtsError,
    Unknown,
}

impl ErrorKind {
    /// Classify an underlying failure by message substring, per the mapping
    /// rules: `timeout` when the message mentions timeout, `rate_limit` for
    /// rate-limiting, `network` for connection-ish failures, `server_error`
    /// otherwise.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ErrorKind::Timeout
        } else if lower.contains("ratelimit") || lower.contains("rate_limit") || lower.contains("rate limit") {
            ErrorKind::RateLimit
        } else if lower.contains("connection")
            || lower.contains("network")
            || lower.contains("dns")
            || lower.contains("socket")
            || lower.contains("refused")
        {
            ErrorKind::Network
        } else {
            ErrorKind::ServerError
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_substring() {
        assert_eq!(ErrorKind::classify("request timeout after 30s"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::classify("RateLimitError: too many requests"), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::classify("connection refused"), ErrorKind::Network);
        assert_eq!(ErrorKind::classify("dns lookup failed"), ErrorKind::Network);
        assert_eq!(ErrorKind::classify("internal server error"), ErrorKind::ServerError);
    }
}
