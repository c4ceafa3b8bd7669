//! Organization membership model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Membership role within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    Member,
    Guest,
}

impl MemberRole {
    pub const ALL: [MemberRole; 3] = [MemberRole::Admin, MemberRole::Member, MemberRole::Guest];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
            MemberRole::Guest => "guest",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, MemberRole::Admin)
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(MemberRole::Admin),
            "member" => Ok(MemberRole::Member),
            "guest" => Ok(MemberRole::Guest),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Membership entity: one active row per (organization, user).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub member_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role_code: String,
    pub created_utc: DateTime<Utc>,
}

impl Membership {
    pub fn new(organization_id: Uuid, user_id: Uuid, role: MemberRole) -> Self {
        Self {
            member_id: Uuid::new_v4(),
            organization_id,
            user_id,
            role_code: role.as_str().to_string(),
            created_utc: Utc::now(),
        }
    }

    /// Role as enum. Unknown codes degrade to `Guest`, the least privileged role.
    pub fn role(&self) -> MemberRole {
        self.role_code.parse().unwrap_or(MemberRole::Guest)
    }

    pub fn is_admin(&self) -> bool {
        self.role().is_admin()
    }
}
