use serde::{Deserialize, Serialize};

/// Subject label stamped on tokens issued at login.
pub const LOGIN_SUBJECT: &str = "Login";

/// JWT payload issued at login and returned by verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject label
    pub iat: i64,    // issued at (unix timestamp)
    pub exp: i64,    // expires at (unix timestamp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// What the issuer needs to know about the account being signed in.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub subject: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}
