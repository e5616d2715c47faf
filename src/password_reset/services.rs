use tracing::{info, warn};

use crate::{
    auth::password::hash_password_blocking,
    error::{AppError, AppResult},
    password_reset::{
        dto::ResetPasswordRequest,
        token::{decode_uid, encode_uid, ResetTokens},
    },
    state::AppState,
};

pub const RESET_REQUESTED: &str =
    "If an account with this email exists, a reset link has been sent.";
pub const RESET_DONE: &str = "Password reset successful.";

/// Mails a reset link when `email` belongs to an active user. The caller
/// answers identically whether or not one was sent.
pub async fn request_reset(state: &AppState, email: Option<&str>) -> AppResult<()> {
    let email = email.map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Err(AppError::BadRequest("Email is required.".into()));
    }

    let Some(user) = state
        .store
        .users()
        .find_by_email(email)
        .await?
        .filter(|u| u.is_active)
    else {
        info!("password reset requested for unknown address");
        return Ok(());
    };

    let token = ResetTokens::from_config(&state.config).issue(&user)?;
    let link = format!(
        "{}/reset-password/{}/{}",
        state.config.frontend_url.trim_end_matches('/'),
        encode_uid(user.id),
        token
    );
    state
        .mailer
        .send_password_reset(&user.email, &link)
        .await
        .map_err(AppError::Mail)?;
    info!(user_id = %user.id, "password reset requested");
    Ok(())
}

pub async fn confirm_reset(
    state: &AppState,
    uidb64: &str,
    token: &str,
    req: ResetPasswordRequest,
) -> AppResult<()> {
    let invalid_link = || AppError::BadRequest("Invalid link.".into());
    let user_id = decode_uid(uidb64).ok_or_else(invalid_link)?;
    let user = state
        .store
        .users()
        .find_by_id(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid_link)?;

    if !ResetTokens::from_config(&state.config).check(&user, token) {
        warn!(user_id = %user.id, "password reset with invalid token");
        return Err(AppError::BadRequest("Invalid or expired token.".into()));
    }

    let (Some(password), Some(password2)) = (
        req.password.filter(|p| !p.is_empty()),
        req.password2.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Password fields are required.".into()));
    };
    if password != password2 {
        return Err(AppError::BadRequest("Passwords do not match.".into()));
    }

    let hash = hash_password_blocking(password).await?;
    state.store.users().set_password(user.id, &hash).await?;
    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        auth::password::verify_password,
        billing::gateway::fake::StubGateway,
        mail::fake::RecordingMailer,
        shops::{dto::RegisterShopRequest, registration::register_shop},
    };

    async fn setup(mailer: Arc<RecordingMailer>) -> AppState {
        let state = AppState::fake_with(mailer, Arc::new(StubGateway::default()));
        let req: RegisterShopRequest = serde_json::from_value(json!({
            "shop": { "name": "Acme" },
            "owner": { "username": "alice", "password": "pw1", "email": "alice@acme.in" }
        }))
        .unwrap();
        register_shop(state.store.as_ref(), req).await.unwrap();
        state
    }

    fn split_link(link: &str) -> (String, String) {
        let tail = link
            .strip_prefix("http://frontend.test/reset-password/")
            .expect("link points at the frontend");
        let (uid, token) = tail.split_once('/').unwrap();
        (uid.to_string(), token.to_string())
    }

    fn passwords(a: &str, b: &str) -> ResetPasswordRequest {
        ResetPasswordRequest {
            password: Some(a.into()),
            password2: Some(b.into()),
        }
    }

    fn bad_request(err: AppError) -> String {
        match err {
            AppError::BadRequest(msg) => msg,
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_reset_flow() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup(mailer.clone()).await;

        request_reset(&state, Some("ALICE@acme.in")).await.unwrap();
        let link = mailer.last_link().expect("mail sent");
        let (uid, token) = split_link(&link);

        let msg = bad_request(confirm_reset(&state, &uid, &token, passwords("a", "b")).await.unwrap_err());
        assert_eq!(msg, "Passwords do not match.");
        let msg = bad_request(
            confirm_reset(&state, &uid, &token, ResetPasswordRequest { password: None, password2: None })
                .await
                .unwrap_err(),
        );
        assert_eq!(msg, "Password fields are required.");

        confirm_reset(&state, &uid, &token, passwords("fresh", "fresh")).await.unwrap();
        let alice = state.store.users().find_by_username("alice").await.unwrap().unwrap();
        assert!(verify_password("fresh", &alice.password_hash).unwrap());

        // The password changed, so the same link is dead now.
        let msg = bad_request(
            confirm_reset(&state, &uid, &token, passwords("again", "again")).await.unwrap_err(),
        );
        assert_eq!(msg, "Invalid or expired token.");
    }

    #[tokio::test]
    async fn unknown_email_sends_nothing_but_succeeds() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup(mailer.clone()).await;
        request_reset(&state, Some("nobody@acme.in")).await.unwrap();
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_email_is_rejected() {
        let state = setup(Arc::new(RecordingMailer::default())).await;
        let msg = bad_request(request_reset(&state, Some("  ")).await.unwrap_err());
        assert_eq!(msg, "Email is required.");
        assert!(request_reset(&state, None).await.is_err());
    }

    #[tokio::test]
    async fn bad_uid_and_token_are_distinguished() {
        let state = setup(Arc::new(RecordingMailer::default())).await;
        let msg = bad_request(confirm_reset(&state, "%%%", "tok", passwords("a", "a")).await.unwrap_err());
        assert_eq!(msg, "Invalid link.");

        let stranger = encode_uid(uuid::Uuid::new_v4());
        let msg = bad_request(confirm_reset(&state, &stranger, "tok", passwords("a", "a")).await.unwrap_err());
        assert_eq!(msg, "Invalid link.");

        let alice = state.store.users().find_by_username("alice").await.unwrap().unwrap();
        let msg = bad_request(
            confirm_reset(&state, &encode_uid(alice.id), "garbage", passwords("a", "a"))
                .await
                .unwrap_err(),
        );
        assert_eq!(msg, "Invalid or expired token.");
    }

    #[tokio::test]
    async fn deactivated_user_cannot_finish_reset() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = setup(mailer.clone()).await;
        request_reset(&state, Some("alice@acme.in")).await.unwrap();
        let (uid, token) = split_link(&mailer.last_link().expect("mail sent"));

        let mut alice = state.store.users().find_by_username("alice").await.unwrap().unwrap();
        alice.is_active = false;
        state.store.users().update_in_shop(&alice).await.unwrap().unwrap();

        let msg = bad_request(
            confirm_reset(&state, &uid, &token, passwords("fresh", "fresh")).await.unwrap_err(),
        );
        assert_eq!(msg, "Invalid link.");
        let alice = state.store.users().find_by_username("alice").await.unwrap().unwrap();
        assert!(verify_password("pw1", &alice.password_hash).unwrap());
    }

    #[tokio::test]
    async fn mail_failure_propagates() {
        let state = setup(Arc::new(RecordingMailer::failing())).await;
        let err = request_reset(&state, Some("alice@acme.in")).await.unwrap_err();
        assert!(matches!(err, AppError::Mail(_)));
    }
}
