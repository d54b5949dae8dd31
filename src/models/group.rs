//! Permission groups.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::decode_set;

/// Named set of permissions granted to every member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: i32,
    pub name: String,
    pub permissions: BTreeSet<String>,
}

impl From<crate::entity::group::Model> for Group {
    fn from(m: crate::entity::group::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            permissions: decode_set(&m.permissions),
        }
    }
}

/// Request to create a group.
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Request to add a user to a group.
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i32,
}
