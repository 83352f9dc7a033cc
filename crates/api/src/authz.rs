//! Per-route role checks, run inside handlers before calling the service.

use thiserror::Error;

use crate::auth::Role;
use crate::context::PrincipalContext;

pub const MODERATOR: &[Role] = &[Role::Moderator];
pub const EMPLOYEE: &[Role] = &[Role::Employee];
pub const ANY_STAFF: &[Role] = &[Role::Employee, Role::Moderator];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("role {role} may not perform this action")]
pub struct AuthzError {
    pub role: Role,
}

pub fn require_role(principal: &PrincipalContext, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&principal.role()) {
        Ok(())
    } else {
        Err(AuthzError {
            role: principal.role(),
        })
    }
}
