//! Double-submit CSRF guard.
//!
//! Safe requests without a token cookie get a fresh token scheduled for the
//! response. Unsafe requests must echo the cookie value in a header. The
//! token is never regenerated while a cookie exists, so concurrent tabs keep
//! working.

use std::collections::HashSet;
use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::config::CsrfConfig;
use crate::http::request::InboundRequest;

/// Why an unsafe request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfFailure {
    MissingCookie,
    MissingHeader,
    Mismatch,
}

impl fmt::Display for CsrfFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CsrfFailure::MissingCookie => "token cookie missing",
            CsrfFailure::MissingHeader => "token header missing",
            CsrfFailure::Mismatch => "token mismatch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsrfOutcome {
    /// Nothing to do.
    Pass,
    /// Safe request without a cookie: set this token on the response.
    Issue(String),
    /// Unsafe request on a bearer-authenticated path.
    Exempt,
    Reject(CsrfFailure),
}

pub struct CsrfGuard {
    cookie_name: String,
    header_name: String,
    token_bytes: usize,
    exempt_paths: HashSet<String>,
}

impl CsrfGuard {
    pub fn new(config: &CsrfConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            header_name: config.header_name.to_ascii_lowercase(),
            token_bytes: config.token_bytes,
            exempt_paths: config.exempt_paths.iter().cloned().collect(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.contains(path)
    }

    pub fn inspect(&self, request: &InboundRequest) -> CsrfOutcome {
        let cookie = request.cookie(&self.cookie_name).filter(|v| !v.is_empty());

        if request.is_safe_method() {
            return match cookie {
                Some(_) => CsrfOutcome::Pass,
                None => CsrfOutcome::Issue(self.generate_token()),
            };
        }

        if self.is_exempt(&request.path) {
            return CsrfOutcome::Exempt;
        }

        let Some(cookie) = cookie else {
            return CsrfOutcome::Reject(CsrfFailure::MissingCookie);
        };
        let Some(header) = request.header(&self.header_name).filter(|v| !v.is_empty()) else {
            return CsrfOutcome::Reject(CsrfFailure::MissingHeader);
        };

        if bool::from(cookie.as_bytes().ct_eq(header.as_bytes())) {
            CsrfOutcome::Pass
        } else {
            CsrfOutcome::Reject(CsrfFailure::Mismatch)
        }
    }

    /// A new random token, hex-encoded.
    pub fn generate_token(&self) -> String {
        let mut bytes = vec![0u8; self.token_bytes];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
