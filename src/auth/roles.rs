// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles and the role-to-permission table.
//!
//! The table is a compile-time constant. Scopes embedded in tokens are
//! derived from it at issuance, so a role change only takes effect once the
//! user's access token is reissued.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A capability checked by route guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Permission {
    #[serde(rename = "coins:write")]
    CoinsWrite,
    #[serde(rename = "coins:read")]
    CoinsRead,
    #[serde(rename = "coins:update")]
    CoinsUpdate,
    #[serde(rename = "coins:delete")]
    CoinsDelete,
    #[serde(rename = "coins:rate-quality")]
    CoinsRateQuality,
    #[serde(rename = "countries:write")]
    CountriesWrite,
    #[serde(rename = "countries:read")]
    CountriesRead,
    #[serde(rename = "countries:update")]
    CountriesUpdate,
    #[serde(rename = "countries:delete")]
    CountriesDelete,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::CoinsWrite,
        Permission::CoinsRead,
        Permission::CoinsUpdate,
        Permission::CoinsDelete,
        Permission::CoinsRateQuality,
        Permission::CountriesWrite,
        Permission::CountriesRead,
        Permission::CountriesUpdate,
        Permission::CountriesDelete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CoinsWrite => "coins:write",
            Permission::CoinsRead => "coins:read",
            Permission::CoinsUpdate => "coins:update",
            Permission::CoinsDelete => "coins:delete",
            Permission::CoinsRateQuality => "coins:rate-quality",
            Permission::CountriesWrite => "countries:write",
            Permission::CountriesRead => "countries:read",
            Permission::CountriesUpdate => "countries:update",
            Permission::CountriesDelete => "countries:delete",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SUPER_ADMIN_PERMISSIONS: &[Permission] = &Permission::ALL;
const APPLICATION_USER_PERMISSIONS: &[Permission] = &[Permission::CoinsRead];
const PAID_USER_PERMISSIONS: &[Permission] = &[Permission::CoinsRead, Permission::CoinsRateQuality];

/// User roles for authorization.
///
/// ## Role Table
///
/// - `SUPER_ADMIN` - every permission
/// - `APPLICATION_USER` - `coins:read`
/// - `PAID_USER` - `coins:read`, `coins:rate-quality`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    /// Default for new accounts.
    #[default]
    ApplicationUser,
    PaidUser,
}

impl Role {
    /// Ordered permission set granted to this role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => SUPER_ADMIN_PERMISSIONS,
            Role::ApplicationUser => APPLICATION_USER_PERMISSIONS,
            Role::PaidUser => PAID_USER_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Permission strings as embedded in tokens.
    pub fn scopes(&self) -> Vec<String> {
        self.permissions()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::SuperAdmin => write!(f, "SUPER_ADMIN"),
            Role::ApplicationUser => write!(f, "APPLICATION_USER"),
            Role::PaidUser => write!(f, "PAID_USER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Role; 3] = [Role::SuperAdmin, Role::ApplicationUser, Role::PaidUser];

    #[test]
    fn super_admin_has_every_permission() {
        for permission in Permission::ALL {
            assert!(Role::SuperAdmin.has_permission(permission));
        }
        assert_eq!(Role::SuperAdmin.permissions(), &Permission::ALL);
    }

    #[test]
    fn application_user_only_reads_coins() {
        assert_eq!(Role::ApplicationUser.scopes(), vec!["coins:read"]);
        assert!(!Role::ApplicationUser.has_permission(Permission::CoinsWrite));
    }

    #[test]
    fn paid_user_can_rate_quality() {
        assert_eq!(
            Role::PaidUser.scopes(),
            vec!["coins:read", "coins:rate-quality"]
        );
    }

    #[test]
    fn every_permission_is_granted_somewhere() {
        for permission in Permission::ALL {
            assert!(ROLES.iter().any(|r| r.has_permission(permission)));
        }
    }

    #[test]
    fn permission_serializes_to_scope_string() {
        let json = serde_json::to_string(&Permission::CoinsRateQuality).unwrap();
        assert_eq!(json, r#""coins:rate-quality""#);
        for permission in Permission::ALL {
            let json = serde_json::to_value(permission).unwrap();
            assert_eq!(json, permission.as_str());
        }
    }

    #[test]
    fn role_serializes_as_display_name() {
        for role in ROLES {
            let json = serde_json::to_value(role).unwrap();
            assert_eq!(json, role.to_string());
            let back: Role = serde_json::from_value(json).unwrap();
            assert_eq!(back, role);
        }
        assert!(serde_json::from_str::<Role>(r#""ROOT""#).is_err());
    }

    #[test]
    fn default_role_is_application_user() {
        assert_eq!(Role::default(), Role::ApplicationUser);
    }
}
