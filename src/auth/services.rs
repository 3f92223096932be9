use std::sync::Arc;

use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::{Claims, TokenInfo, LOGIN_SUBJECT},
        dto::{LoginRequest, RegisterRequest},
        jwt::TokenIssuer,
        password::{hash_password, verify_password},
        repo::AccountRepository,
        repo_types::{Account, NewAccount},
    },
    clock::Clock,
    error::AppError,
};

pub const MAX_NAME_LEN: usize = 64;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("invalid email".into()));
    }
    Ok(email)
}

fn validate_name(field: &str, value: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

/// Registration, login and token verification over the injected ports.
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountRepository>,
    issuer: Arc<dyn TokenIssuer>,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        issuer: Arc<dyn TokenIssuer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            accounts,
            issuer,
            clock,
        }
    }

    #[instrument(skip(self))]
    pub async fn account_exists(&self, email: &str) -> Result<bool, AppError> {
        let found = self
            .accounts
            .find_by_email(email)
            .await
            .context("repo find account")?;
        Ok(found.is_some())
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<Account, AppError> {
        let first_name = validate_name("first_name", &req.first_name)?;
        let last_name = validate_name("last_name", &req.last_name)?;
        let email = normalize_email(&req.email)?;
        if req.password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }

        if self.account_exists(&email).await? {
            warn!(%email, "email already registered");
            return Err(AppError::DuplicateEmail(email));
        }

        let password = req.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("join hash task")??;

        let account = self
            .accounts
            .create(NewAccount {
                first_name,
                last_name,
                email,
                password_hash,
            })
            .await?;

        info!(account_id = %account.id, email = %account.email, "account registered");
        Ok(account)
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<String, AppError> {
        let email = normalize_email(&req.email)?;
        if req.password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }

        let account = self
            .accounts
            .find_by_email(&email)
            .await
            .context("repo find account")?
            .ok_or_else(|| {
                warn!(%email, "login unknown email");
                AppError::AccountNotFound
            })?;

        let password = req.password;
        let hash = account.password_hash.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .context("join verify task")??;
        if !matches {
            warn!(%email, account_id = %account.id, "login invalid password");
            return Err(AppError::InvalidPassword);
        }

        let info = TokenInfo {
            subject: LOGIN_SUBJECT.to_string(),
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
        };
        let token = self
            .issuer
            .issue(&info, self.clock.now())
            .context("token signing")?;

        info!(account_id = %account.id, "account logged in");
        Ok(token)
    }

    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        self.issuer.validate(token, self.clock.now())
    }
}
