// src/context.rs
//! Per-request caller context: who is asking, what roles they hold and
//! which site the request originates from. Built by the caller, never
//! read from process-wide state.

use crate::error::{RadarError, RadarResult};

pub const ROLE_SYSTEM_MANAGER: &str = "System Manager";
pub const ROLE_COS: &str = "COS";

pub const GUEST_USER: &str = "Guest";

/// Roles allowed to use the due-diligence and lead-radar pages.
pub const ELEVATED_ROLES: &[&str] = &[ROLE_COS, ROLE_SYSTEM_MANAGER];
/// Roles allowed to publish configuration.
pub const PUBLISH_ROLES: &[&str] = &[ROLE_SYSTEM_MANAGER];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub user: String,
    pub roles: Vec<String>,
    pub site: String,
}

impl RequestContext {
    pub fn new(user: impl Into<String>, roles: Vec<String>, site: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            roles,
            site: site.into(),
        }
    }

    pub fn guest(site: impl Into<String>) -> Self {
        Self::new(GUEST_USER, Vec::new(), site)
    }

    pub fn is_guest(&self) -> bool {
        let u = self.user.trim();
        u.is_empty() || u == GUEST_USER
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Guests get `LoginRequired`; signed-in callers without any of `roles`
    /// get `PermissionDenied`.
    pub fn require_any_role(&self, roles: &[&str]) -> RadarResult<()> {
        if self.is_guest() {
            return Err(RadarError::LoginRequired);
        }
        if roles.iter().any(|r| self.has_role(r)) {
            Ok(())
        } else {
            tracing::warn!(user = %self.user, required = ?roles, "permission denied");
            Err(RadarError::PermissionDenied)
        }
    }
}
