use serde::{Deserialize, Serialize};

/// A user account. The stored password is a salted PBKDF2 hash.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Account {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub owner: bool,
}
