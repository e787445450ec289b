// src/error.rs
//! Error taxonomy shared by the staff lookup and publish paths.

use std::net::IpAddr;

use thiserror::Error;

/// Coarse error classes surfaced to callers (and mapped to HTTP status codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    LoginRequired,
    Permission,
    UpstreamUnavailable,
    UpstreamRejected,
    UpstreamBadResponse,
    Store,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::LoginRequired => "login_required",
            ErrorKind::Permission => "permission_error",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamRejected => "upstream_rejected",
            ErrorKind::UpstreamBadResponse => "upstream_bad_response",
            ErrorKind::Store => "store_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Why a URL was refused by the SSRF guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejection {
    #[error("URL is empty")]
    Empty,
    #[error("URL is malformed: {0}")]
    Malformed(String),
    #[error("scheme '{0}' is not allowed (http/https only)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("URL must not embed credentials")]
    EmbeddedCredentials,
    #[error("host '{0}' is not allowed")]
    BlockedHost(String),
    #[error("port {0} is not allowed (80/443 only)")]
    DisallowedPort(u16),
    #[error("host '{0}' could not be resolved")]
    Unresolvable(String),
    #[error("host resolves to non-public address {0}")]
    NonPublicAddress(IpAddr),
}

impl UrlRejection {
    /// Short label used for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            UrlRejection::Empty => "empty",
            UrlRejection::Malformed(_) => "malformed",
            UrlRejection::UnsupportedScheme(_) => "scheme",
            UrlRejection::MissingHost => "missing_host",
            UrlRejection::EmbeddedCredentials => "credentials",
            UrlRejection::BlockedHost(_) => "blocked_host",
            UrlRejection::DisallowedPort(_) => "port",
            UrlRejection::Unresolvable(_) => "unresolvable",
            UrlRejection::NonPublicAddress(_) => "non_public",
        }
    }
}

#[derive(Debug, Error)]
pub enum RadarError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] UrlRejection),
    #[error("Invalid request body: {0}")]
    BadRequest(String),
    #[error("Publisher URL is required")]
    MissingPublisherUrl,
    #[error("Create at least one Lead Radar Source before publishing.")]
    EmptySources,
    #[error("Create at least one Lead Radar Keyword Pack before publishing.")]
    EmptyKeywordPacks,

    #[error("Login required.")]
    LoginRequired,
    #[error("Not permitted.")]
    PermissionDenied,

    #[error("Failed to fetch staff page: {0}")]
    StaffPageUnreachable(String),
    #[error("Staff page returned HTTP {status}")]
    StaffPageRejected { status: u16 },
    #[error("Staff page is not HTML (content-type: '{content_type}')")]
    StaffPageNotHtml { content_type: String },

    #[error("Failed to contact publisher service.")]
    PublisherUnreachable(#[source] anyhow::Error),
    #[error("Publisher failed ({status}): {body}")]
    PublisherRejected { status: u16, body: String },
    #[error("Publisher returned non-JSON response: {body}")]
    PublisherBadResponse { body: String },
    #[error("Publisher error: {body}")]
    PublisherError { body: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RadarError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RadarError::InvalidUrl(_)
            | RadarError::BadRequest(_)
            | RadarError::MissingPublisherUrl
            | RadarError::EmptySources
            | RadarError::EmptyKeywordPacks => ErrorKind::Validation,
            RadarError::LoginRequired => ErrorKind::LoginRequired,
            RadarError::PermissionDenied => ErrorKind::Permission,
            RadarError::StaffPageUnreachable(_) | RadarError::PublisherUnreachable(_) => {
                ErrorKind::UpstreamUnavailable
            }
            RadarError::StaffPageRejected { .. }
            | RadarError::PublisherRejected { .. }
            | RadarError::PublisherError { .. } => ErrorKind::UpstreamRejected,
            RadarError::StaffPageNotHtml { .. } | RadarError::PublisherBadResponse { .. } => {
                ErrorKind::UpstreamBadResponse
            }
            RadarError::Store(_) => ErrorKind::Store,
            RadarError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type RadarResult<T> = std::result::Result<T, RadarError>;
