use serde::{Deserialize, Serialize};

/// Identity resolved by the external identity provider.
///
/// The `uid` is opaque and owned by the provider; this crate never derives
/// or persists identity, it only reads what the provider reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}
