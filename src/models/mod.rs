//! Domain models for gauth.

use std::collections::BTreeSet;

pub mod group;
pub mod identity;
pub mod oauth;
pub mod permission;
pub mod user;

// Re-export commonly used types
pub use group::{AddMemberRequest, CreateGroupRequest, Group};
pub use identity::{AnonymousUser, Identity, RequestIdentity};
pub use oauth::{
    AppOAuthCredentials, CredentialsDefaults, CredentialsResponse, ExchangeCodeRequest,
    OAuthUserSession, SessionState, SessionStatusResponse, TokenBundle,
};
pub use permission::{Permission, PermissionGrantRequest, PermissionRegistry, UserPermission};
pub use user::{CreateUserRequest, ExtraFields, User, UserResponse};

/// Encode a set as sorted, space-separated text.
pub fn encode_set<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .filter_map(|s| {
            let s = s.as_ref().trim();
            (!s.is_empty()).then(|| s.to_string())
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode space-separated text into a set. Duplicates collapse.
pub fn decode_set(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
