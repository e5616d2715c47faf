use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{
        claims::{Claims, TokenKind},
        repo_types::User,
    },
    config::AppConfig,
};

/// URL-safe, unpadded base64 of the user id.
pub fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

pub fn decode_uid(uidb64: &str) -> Option<Uuid> {
    let raw = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    Uuid::from_slice(&raw).ok()
}

/// Issues and checks single-purpose reset tokens.
///
/// The signing key mixes the server secret with the user's current password
/// hash, so setting a new password voids every token issued before it.
pub struct ResetTokens {
    secret: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl ResetTokens {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            secret: cfg.jwt.secret.clone(),
            issuer: cfg.jwt.issuer.clone(),
            audience: cfg.jwt.audience.clone(),
            ttl: Duration::seconds(cfg.password_reset_ttl_secs.max(1)),
        }
    }

    fn key_material(&self, user: &User) -> Vec<u8> {
        let mut key = self.secret.as_bytes().to_vec();
        key.extend_from_slice(user.password_hash.as_bytes());
        key
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user.id,
            iat: now.unix_timestamp() as usize,
            exp: (now + self.ttl).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind: TokenKind::PasswordReset,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.key_material(user)),
        )?;
        debug!(user_id = %user.id, "reset token issued");
        Ok(token)
    }

    /// True when `token` was issued for `user` and is still live.
    pub fn check(&self, user: &User, token: &str) -> bool {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.key_material(user)),
            &validation,
        ) {
            Ok(data) => data.claims.kind == TokenKind::PasswordReset && data.claims.sub == user.id,
            Err(e) => {
                debug!(user_id = %user.id, error = %e, "reset token rejected");
                false
            }
        }
    }
}
