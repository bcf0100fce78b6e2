// Authorization gate
//
// Every entry point names one `Rule` from the table below and, when the
// target resource has an owner, whether the caller is that owner.

use crate::auth::Principal;
use crate::domain::user::Role;
use crate::errors::{AppError, Result};

/// Roles that operate the gate.
pub const STAFF: &[Role] = &[Role::Security, Role::Admin, Role::SuperAdmin];
/// Roles that administer identities.
pub const ADMINS: &[Role] = &[Role::Admin, Role::SuperAdmin];
pub const RESIDENTS: &[Role] = &[Role::Resident];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any authenticated caller.
    Authenticated,
    /// Caller's role must be listed.
    Roles(&'static [Role]),
    /// Caller must own the resource or hold a listed role.
    OwnerOrRoles(&'static [Role]),
}

/// Relationship between the caller and the resource being acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owner,
    NotOwner,
    NotApplicable,
}

impl From<bool> for Ownership {
    fn from(is_owner: bool) -> Self {
        if is_owner {
            Ownership::Owner
        } else {
            Ownership::NotOwner
        }
    }
}

// Capability table
pub const MANAGE_USERS: Rule = Rule::Roles(ADMINS);
pub const LIST_RESIDENTS: Rule = Rule::Roles(&[Role::Admin, Role::Security, Role::SuperAdmin]);
pub const ISSUE_GUEST_CODE: Rule = Rule::Roles(RESIDENTS);
pub const VERIFY_GUEST_CODE: Rule = Rule::Roles(&[Role::Security, Role::SuperAdmin]);
pub const REVOKE_GUEST_CODE: Rule = Rule::OwnerOrRoles(ADMINS);
pub const CREATE_VISIT: Rule = Rule::OwnerOrRoles(STAFF);
pub const VIEW_VISIT: Rule = Rule::OwnerOrRoles(STAFF);
pub const CHECK_VISIT: Rule = Rule::Roles(STAFF);
pub const CANCEL_VISIT: Rule = Rule::OwnerOrRoles(STAFF);
pub const AUTHORIZE_DELIVERY: Rule = Rule::Roles(RESIDENTS);
pub const UPDATE_DELIVERY_STATUS: Rule = Rule::Roles(STAFF);
pub const VIEW_GATE_ACTIVITY: Rule = Rule::Roles(STAFF);
pub const RECORD_ACCESS: Rule = Rule::Roles(STAFF);
pub const SEND_NOTIFICATION: Rule = Rule::Roles(ADMINS);
pub const JOIN_RESIDENT_ROOM: Rule = Rule::OwnerOrRoles(STAFF);
pub const JOIN_SECURITY_ROOM: Rule = Rule::Roles(STAFF);

/// The single capability check consulted before every guarded operation.
pub fn authorize(principal: &Principal, rule: Rule, ownership: Ownership) -> Result<()> {
    let allowed = match rule {
        Rule::Authenticated => true,
        Rule::Roles(roles) => roles.contains(&principal.role),
        Rule::OwnerOrRoles(roles) => {
            ownership == Ownership::Owner || roles.contains(&principal.role)
        }
    };

    if allowed {
        return Ok(());
    }

    tracing::debug!(
        user_id = %principal.user_id,
        role = principal.role.as_str(),
        ?rule,
        ?ownership,
        "Authorization denied"
    );

    Err(match rule {
        Rule::Roles(_) => AppError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            principal.role.as_str()
        )),
        _ => AppError::Forbidden("Not authorized to access this resource".to_string()),
    })
}
