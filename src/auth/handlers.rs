use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::dto::{LoginRequest, MessageResponse, RegisterRequest},
    config::CookieConfig,
    error::AppError,
    state::AppState,
};

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "Authentication";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify", get(verify))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match payload {
        Ok(Json(v)) => Ok(v),
        Err(e) => {
            warn!(error = %e, "json decode failed");
            Err(AppError::InvalidBody)
        }
    }
}

fn auth_cookie(
    token: String,
    cfg: &CookieConfig,
    now: OffsetDateTime,
) -> Result<Cookie<'static>, AppError> {
    let ttl = Duration::seconds(cfg.ttl_hours.saturating_mul(3600));
    let expires = now
        .checked_add(ttl)
        .ok_or_else(|| anyhow::anyhow!("cookie ttl {ttl} overflows expiry"))?;
    Ok(Cookie::build((AUTH_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(cfg.secure)
        .max_age(ttl)
        .expires(expires)
        .build())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = body(payload)?;
    state.auth.register(req).await?;
    Ok(Json(MessageResponse::new("user registered successfully")))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let req = body(payload)?;
    let token = state.auth.login(req).await?;

    let cookie = auth_cookie(token, &state.config.cookie, state.clock.now())?;
    Ok((jar.add(cookie), Json(MessageResponse::new("login successful"))))
}

#[instrument(skip(state, jar))]
pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<MessageResponse>, AppError> {
    let token = jar.get(AUTH_COOKIE).ok_or_else(|| {
        warn!("auth cookie missing");
        AppError::MissingCookie
    })?;

    let claims = state.auth.verify(token.value())?;
    let email = claims.email.ok_or(AppError::TokenNotValid)?;

    info!(%email, "session verified");
    Ok(Json(MessageResponse::new(format!(
        "user {email} still logged in"
    ))))
}
