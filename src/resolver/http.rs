//! Shared HTTP plumbing for the scraped sources.

use reqwest::{Client, StatusCode};

use crate::config::ResolverConfig;
use crate::error::{RegnetError, Result};

/// How a response status is treated by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// 4xx and other non-success answers: the source has nothing for us
    NoData,
    /// 5xx: the source itself is failing
    ServerError,
}

pub fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status.is_server_error() {
        StatusClass::ServerError
    } else {
        StatusClass::NoData
    }
}

/// Who is on the other end of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    /// Scraped public mirror; honours `accept_invalid_certs`
    Mirror,
    /// Authoritative API; certificates are always verified
    Authoritative,
}

/// Whether certificate checks are skipped for a client of the given trust
pub fn relax_tls(config: &ResolverConfig, trust: Trust) -> bool {
    trust == Trust::Mirror && config.accept_invalid_certs
}

/// Build an outbound HTTP client
///
/// Certificate checks are relaxed only for [`Trust::Mirror`] clients and only
/// when `accept_invalid_certs` is set.
pub fn build_client(config: &ResolverConfig, trust: Trust) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .user_agent(config.user_agent.clone())
        .danger_accept_invalid_certs(relax_tls(config, trust))
        .build()
        .map_err(|e| RegnetError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a reqwest transport error onto the resolver taxonomy
pub fn transport_error(source_name: &str, e: reqwest::Error) -> RegnetError {
    if e.is_builder() {
        return RegnetError::Config(format!("{}: invalid request: {}", source_name, e));
    }
    RegnetError::TransientNetwork(format!("{}: {}", source_name, e))
}

/// `Ok(true)` on success, `Ok(false)` when the source has no data, and
/// `ServiceDown` on a 5xx answer
pub fn check_status(source_name: &str, status: StatusCode) -> Result<bool> {
    match classify_status(status) {
        StatusClass::Success => Ok(true),
        StatusClass::NoData => {
            log::debug!("{} answered {}, treating as no data", source_name, status);
            Ok(false)
        }
        StatusClass::ServerError => Err(RegnetError::ServiceDown {
            source_name: source_name.to_string(),
            detail: format!("HTTP {}", status.as_u16()),
        }),
    }
}
