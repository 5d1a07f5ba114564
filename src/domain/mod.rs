//! Core domain types for the back-office: roles and their capabilities.
//!
//! The permission model is intentionally a single table. Creation checks,
//! management checks and capability checks all consult the same data so the
//! three views can never drift apart.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Privilege tier of an operator account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    SystemAdmin,
    ServiceEngineer,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::SystemAdmin => "system_admin",
            Self::ServiceEngineer => "service_engineer",
        }
    }

    /// Whether `self` may create or manage (update, delete, reset the
    /// password of) an account holding `target`.
    ///
    /// One table backs both the creation and the management checks.
    #[must_use]
    pub const fn may_administer(self, target: Self) -> bool {
        match self {
            Self::SuperAdmin => true,
            Self::SystemAdmin => matches!(target, Self::ServiceEngineer),
            Self::ServiceEngineer => false,
        }
    }

    /// Capability lookup for this role.
    #[must_use]
    pub const fn has_permission(self, capability: Capability) -> bool {
        use Capability as C;
        match self {
            Self::SuperAdmin => true,
            Self::SystemAdmin => matches!(
                capability,
                C::ManageServiceEngineers
                    | C::ManageTravellers
                    | C::ManageScooters
                    | C::ViewLogs
                    | C::CreateBackup
                    | C::RestoreBackup
            ),
            // Field-limited scooter updates only; the per-field whitelist is
            // enforced by the scooter repository.
            Self::ServiceEngineer => matches!(capability, C::ManageScooters),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Self::SuperAdmin),
            "system_admin" => Ok(Self::SystemAdmin),
            "service_engineer" => Ok(Self::ServiceEngineer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Error for role strings outside the three valid tiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Privileged actions an operator may attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ManageUsers,
    ManageSystemAdmins,
    ManageServiceEngineers,
    ManageTravellers,
    ManageScooters,
    ViewLogs,
    CreateBackup,
    RestoreBackup,
    GenerateRestoreCodes,
    RevokeRestoreCodes,
}
