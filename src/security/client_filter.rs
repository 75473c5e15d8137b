//! User-agent deny-list.

use crate::error::GateError;
use crate::http::request::InboundRequest;

pub struct ClientFilter {
    patterns: Vec<String>,
    block_empty: bool,
}

impl ClientFilter {
    /// Patterns are matched as case-insensitive substrings. An empty pattern
    /// matches only a missing or blank user agent.
    pub fn new(patterns: &[String]) -> Self {
        let block_empty = patterns.iter().any(|p| p.trim().is_empty());
        let patterns = patterns
            .iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            patterns,
            block_empty,
        }
    }

    pub fn is_blocked(&self, user_agent: Option<&str>) -> bool {
        let ua = user_agent.map(str::trim).unwrap_or_default();
        if ua.is_empty() {
            return self.block_empty;
        }
        let ua = ua.to_ascii_lowercase();
        self.patterns.iter().any(|p| ua.contains(p.as_str()))
    }

    pub fn check(&self, request: &InboundRequest) -> Result<(), GateError> {
        if self.is_blocked(request.user_agent()) {
            Err(GateError::BlockedClient)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;

    fn filter() -> ClientFilter {
        ClientFilter::new(&SecurityConfig::default().blocked_user_agents)
    }

    #[test]
    fn test_blocks_tools_and_empty() {
        let f = filter();
        assert!(f.is_blocked(None));
        assert!(f.is_blocked(Some("   ")));
        assert!(f.is_blocked(Some("curl/8.4.0")));
        assert!(f.is_blocked(Some("Python-Requests/2.31")));
        assert!(f.is_blocked(Some("Mozilla/5.0 (compatible; Nikto/2.5)")));
    }

    #[test]
    fn test_allows_browsers() {
        let f = filter();
        assert!(!f.is_blocked(Some(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36"
        )));
    }

    #[test]
    fn test_without_empty_pattern_blank_agent_passes() {
        let f = ClientFilter::new(&["curl".to_string()]);
        assert!(!f.is_blocked(None));
        assert!(f.check(&InboundRequest::new("GET", "/").with_header("user-agent", "curl/8")).is_err());
    }
}
