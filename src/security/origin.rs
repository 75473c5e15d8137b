//! Referring-origin check for the API surface.
//!
//! `Origin` is used when present, otherwise the origin of `Referer`. A
//! request with neither is allowed (first-party non-browser callers).

use std::collections::HashSet;

use url::Url;

use crate::config::SiteConfig;
use crate::error::GateError;
use crate::http::request::InboundRequest;

pub struct OriginPolicy {
    allowed: HashSet<String>,
}

impl OriginPolicy {
    pub fn new(site: &SiteConfig) -> Self {
        let allowed = std::iter::once(&site.origin)
            .chain(site.extra_origins.iter())
            .filter_map(|origin| normalize(origin))
            .collect();
        Self { allowed }
    }

    pub fn check(&self, request: &InboundRequest) -> Result<(), GateError> {
        let declared = request
            .header("origin")
            .filter(|v| !v.is_empty() && *v != "null")
            .or_else(|| request.header("referer").filter(|v| !v.is_empty()));

        let Some(declared) = declared else {
            return Ok(());
        };

        match normalize(declared) {
            Some(origin) if self.allowed.contains(&origin) => Ok(()),
            _ => Err(GateError::OriginMismatch {
                origin: declared.to_string(),
            }),
        }
    }
}

/// `scheme://host[:port]` with default ports dropped.
fn normalize(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
