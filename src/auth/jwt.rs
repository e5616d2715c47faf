use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::claims::{Claims, TokenKind},
    config::JwtConfig,
    error::AppError,
    state::AppState,
};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(1) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(1) as u64) * 60),
        }
    }

    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
            TokenKind::PasswordReset => anyhow::bail!("reset tokens are issued per user"),
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Refresh)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            anyhow::bail!("not a refresh token");
        }
        Ok(claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from_config(&state.config.jwt)
    }
}

/// Bearer access token from the `Authorization` header, resolved to its user id.
pub struct AuthUser(pub Uuid);

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Err(AppError::Unauthorized("Missing Authorization header".into()));
        }
        let token = bearer(parts)
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;
        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }
        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;
    use crate::config::AppConfig;

    fn keys() -> JwtKeys {
        JwtKeys::from_config(&AppConfig::for_tests().jwt)
    }

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/api/v1/me");
        if let Some(auth) = auth {
            req = req.header(AUTHORIZATION, auth);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn access_and_refresh_tokens_carry_their_kind() {
        let keys = keys();
        let user_id = Uuid::new_v4();

        let access = keys.verify(&keys.sign_access(user_id).unwrap()).unwrap();
        assert_eq!(access.sub, user_id);
        assert_eq!(access.kind, TokenKind::Access);
        assert_eq!(access.iss, "test-issuer");

        let refresh = keys.sign_refresh(user_id).unwrap();
        assert_eq!(keys.verify_refresh(&refresh).unwrap().sub, user_id);
        let access = keys.sign_access(user_id).unwrap();
        assert!(keys.verify_refresh(&access).is_err());
    }

    #[test]
    fn foreign_issuer_audience_or_secret_rejected() {
        let keys = keys();
        let token = keys.sign_access(Uuid::new_v4()).unwrap();

        let mut cfg = AppConfig::for_tests().jwt;
        cfg.audience = "someone-else".into();
        assert!(JwtKeys::from_config(&cfg).verify(&token).is_err());

        let mut cfg = AppConfig::for_tests().jwt;
        cfg.secret = "another-secret".into();
        assert!(JwtKeys::from_config(&cfg).verify(&token).is_err());
    }

    #[test]
    fn reset_kind_is_not_signed_here() {
        assert!(keys()
            .sign_with_kind(Uuid::new_v4(), TokenKind::PasswordReset)
            .is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer(&parts_with(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer(&parts_with(Some("Basic dXNlcjpwdw=="))), None);
        assert_eq!(bearer(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer(&parts_with(None)), None);
    }

    #[tokio::test]
    async fn extractor_wants_an_access_token() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let user_id = Uuid::new_v4();

        let mut parts = parts_with(Some(&format!("Bearer {}", keys.sign_access(user_id).unwrap())));
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(id, user_id);

        let mut parts = parts_with(Some(&format!("Bearer {}", keys.sign_refresh(user_id).unwrap())));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Access token required"));

        let mut parts = parts_with(None);
        let err = AuthUser::from_request_parts(&mut parts, &state).await.err().unwrap();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Missing Authorization header"));
    }
}
