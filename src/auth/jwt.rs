use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::claims::{Claims, TokenInfo};
use crate::{config::JwtConfig, error::AppError};

/// Every token is signed and accepted with this algorithm only.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Signs claim sets into compact tokens and validates them back.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, info: &TokenInfo, now: OffsetDateTime) -> anyhow::Result<String>;
    fn validate(&self, token: &str, now: OffsetDateTime) -> Result<Claims, AppError>;
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        let ttl = Duration::seconds(cfg.ttl_minutes.saturating_mul(60));
        Self::new(cfg.secret.as_bytes(), ttl)
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        // Expiry is checked against the injected clock instead.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        validation
    }
}

impl TokenIssuer for JwtKeys {
    fn issue(&self, info: &TokenInfo, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now
            .checked_add(self.ttl)
            .ok_or_else(|| anyhow::anyhow!("token ttl {} overflows expiry", self.ttl))?;
        let claims = Claims {
            sub: info.subject.clone(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            email: Some(info.email.clone()),
            first_name: Some(info.first_name.clone()),
            last_name: Some(info.last_name.clone()),
        };
        let mut header = Header::new(ALGORITHM);
        header.typ = Some("JWT".into());
        let token = encode(&header, &claims, &self.encoding)?;
        debug!(email = %info.email, exp = claims.exp, "jwt signed");
        Ok(token)
    }

    fn validate(&self, token: &str, now: OffsetDateTime) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding, &Self::validation()).map_err(|e| {
            warn!(error = %e, "jwt rejected");
            AppError::TokenNotValid
        })?;

        let claims = data.claims;
        if now.unix_timestamp() >= claims.exp {
            warn!(exp = claims.exp, "jwt expired");
            return Err(AppError::TokenNotValid);
        }
        debug!(sub = %claims.sub, "jwt verified");
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::LOGIN_SUBJECT;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2023-09-06 00:00 UTC);

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::new(secret.as_bytes(), Duration::hours(2))
    }

    fn info() -> TokenInfo {
        TokenInfo {
            subject: LOGIN_SUBJECT.into(),
            email: "test@gmail.com".into(),
            first_name: "Test".into(),
            last_name: "Test".into(),
        }
    }

    #[test]
    fn issue_and_validate() {
        let keys = keys("test_secret");
        let token = keys.issue(&info(), NOW).expect("sign");
        let claims = keys.validate(&token, NOW).expect("verify");

        assert_eq!(claims.sub, "Login");
        assert_eq!(claims.iat, 1693958400);
        assert_eq!(claims.exp, 1693958400 + 2 * 3600);
        assert_eq!(claims.email.as_deref(), Some("test@gmail.com"));
        assert_eq!(claims.first_name.as_deref(), Some("Test"));
        assert_eq!(claims.last_name.as_deref(), Some("Test"));
    }

    #[test]
    fn header_declares_hs256_jwt() {
        let token = keys("test_secret").issue(&info(), NOW).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn signing_is_deterministic_for_a_pinned_clock() {
        let keys = keys("test_secret");
        assert_eq!(
            keys.issue(&info(), NOW).unwrap(),
            keys.issue(&info(), NOW).unwrap()
        );
    }

    #[test]
    fn rejects_expired_token() {
        let keys = keys("test_secret");
        let token = keys.issue(&info(), NOW).unwrap();

        let at_expiry = NOW + Duration::hours(2);
        assert!(matches!(
            keys.validate(&token, at_expiry),
            Err(AppError::TokenNotValid)
        ));
        let just_before = at_expiry - Duration::seconds(1);
        assert!(keys.validate(&token, just_before).is_ok());
    }

    #[test]
    fn overflowing_ttl_is_an_error() {
        let keys = JwtKeys::new(b"test_secret", Duration::MAX);
        assert!(keys.issue(&info(), NOW).is_err());

        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "test_secret".into(),
            ttl_minutes: i64::MAX,
        });
        assert!(keys.issue(&info(), NOW).is_err());
    }

    #[test]
    fn rejects_token_from_another_secret() {
        let token = keys("other_secret").issue(&info(), NOW).unwrap();
        assert!(matches!(
            keys("test_secret").validate(&token, NOW),
            Err(AppError::TokenNotValid)
        ));
    }

    #[test]
    fn rejects_unexpected_algorithm() {
        let claims = Claims {
            sub: "Login".into(),
            iat: NOW.unix_timestamp(),
            exp: (NOW + Duration::hours(1)).unix_timestamp(),
            email: Some("test@gmail.com".into()),
            first_name: None,
            last_name: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        assert!(matches!(
            keys("test_secret").validate(&token, NOW),
            Err(AppError::TokenNotValid)
        ));
    }

    #[test]
    fn rejects_garbage() {
        let keys = keys("test_secret");
        for token in ["", "not.a.jwt", "abc"] {
            assert!(matches!(
                keys.validate(token, NOW),
                Err(AppError::TokenNotValid)
            ));
        }
    }

    #[test]
    fn rejects_tampered_payload() {
        let verifier = keys("test_secret");
        let token = verifier.issue(&info(), NOW).unwrap();
        let forged = keys("x")
            .issue(
                &TokenInfo {
                    email: "admin@gmail.com".into(),
                    ..info()
                },
                NOW,
            )
            .unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged.split('.').nth(1).unwrap();
        let spliced = parts.join(".");
        assert!(matches!(
            verifier.validate(&spliced, NOW),
            Err(AppError::TokenNotValid)
        ));
    }
}
