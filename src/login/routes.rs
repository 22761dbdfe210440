use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginSuccess {
    email: String,
    message: &'static str,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(login_submit))
        .with_state(state)
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> Result<Json<LoginSuccess>, AppError> {
    if form.email.is_empty() || form.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required.".to_string(),
        ));
    }
    let origin = addr.ip().to_string();

    // Check brute force block
    let status = state
        .login_tracker
        .lock()
        .await
        .is_blocked(&form.email, &origin);
    if status.blocked {
        tracing::warn!(
            "Rejected login for {} from {}: blocked for {}s",
            form.email,
            origin,
            status.remaining_secs
        );
        return Err(AppError::TooManyAttempts(status.remaining_secs));
    }

    if form.email == state.admin_config.email && form.password == state.admin_config.password {
        state
            .login_tracker
            .lock()
            .await
            .reset_attempts(&form.email, &origin);
        tracing::info!("Login succeeded for {} from {}", form.email, origin);
        Ok(Json(LoginSuccess {
            email: form.email,
            message: "Login successful",
        }))
    } else {
        state
            .login_tracker
            .lock()
            .await
            .add_attempt(&form.email, &origin);
        Err(AppError::Unauthorized("Invalid credentials"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Request, StatusCode};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use crate::config::{AdminConfig, LockoutPolicy};
    use crate::login::brute_force::test_clock::ManualClock;
    use crate::login::brute_force::AttemptTracker;

    fn test_state() -> (Arc<AppState>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let state = Arc::new(AppState {
            login_tracker: Mutex::new(AttemptTracker::with_clock(
                LockoutPolicy::default(),
                clock.clone(),
            )),
            admin_config: AdminConfig {
                email: "admin@x.com".to_string(),
                password: "correct-horse".to_string(),
            },
        });
        (state, clock)
    }

    fn app(state: &Arc<AppState>, ip: [u8; 4]) -> Router {
        router(state.clone()).layer(MockConnectInfo(SocketAddr::from((ip, 40000))))
    }

    async fn post_login(app: &Router, email: &str, password: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("email={}&password={}", email, password)))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_successful_login() {
        let (state, _) = test_state();
        let app = app(&state, [1, 1, 1, 1]);
        let (status, body) = post_login(&app, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["email"], "admin@x.com");
        assert_eq!(json["message"], "Login successful");
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let (state, _) = test_state();
        let app = app(&state, [1, 1, 1, 1]);
        let (status, body) = post_login(&app, "admin@x.com", "nope").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, "Invalid credentials");
    }

    #[tokio::test]
    async fn test_empty_fields_rejected_without_counting() {
        let (state, _) = test_state();
        let app = app(&state, [1, 1, 1, 1]);
        for _ in 0..6 {
            let (status, _) = post_login(&app, "", "whatever").await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(state.login_tracker.lock().await.tracked_keys(), (0, 0));
    }

    #[tokio::test]
    async fn test_blocks_after_five_failures_then_recovers() {
        let (state, clock) = test_state();
        let app = app(&state, [1, 1, 1, 1]);
        for _ in 0..5 {
            let (status, _) = post_login(&app, "admin@x.com", "nope").await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        clock.set(Duration::from_secs(10));
        // Even the right password is refused while blocked.
        let (status, body) = post_login(&app, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, "Too many login attempts. Try again in 290 seconds.");

        clock.set(Duration::from_secs(301));
        let (status, _) = post_login(&app, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let (state, _) = test_state();
        let app = app(&state, [2, 2, 2, 2]);
        for _ in 0..4 {
            post_login(&app, "admin@x.com", "nope").await;
        }
        let (status, _) = post_login(&app, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::OK);

        // Counter starts over: four more failures do not block.
        for _ in 0..4 {
            post_login(&app, "admin@x.com", "nope").await;
        }
        let (status, _) = post_login(&app, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_spraying_from_one_origin_is_blocked() {
        let (state, _) = test_state();
        let attacker = app(&state, [6, 6, 6, 6]);
        for i in 0..5 {
            post_login(&attacker, &format!("user{}@x.com", i), "guess").await;
        }
        let (status, _) = post_login(&attacker, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let bystander = app(&state, [7, 7, 7, 7]);
        let (status, _) = post_login(&bystander, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stuffing_one_account_from_many_origins_is_blocked() {
        let (state, _) = test_state();
        for i in 0..5 {
            let origin = app(&state, [10, 0, 0, i]);
            post_login(&origin, "admin@x.com", "guess").await;
        }
        let fresh = app(&state, [10, 0, 0, 200]);
        let (status, _) = post_login(&fresh, "admin@x.com", "correct-horse").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }
}
