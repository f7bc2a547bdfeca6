//! Shared helpers for retiscan-ui integration tests
//!
//! External services are stood in for by small axum routers served on an
//! ephemeral local port.

#![allow(dead_code)]

use axum::Router;
use retiscan_ui::session::{Session, User};
use retiscan_ui::ImagePayload;
use serde_json::{json, Value};

/// PNG signature plus IHDR tag: enough for content sniffing
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

/// Serve `router` on 127.0.0.1:0; returns the base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL nothing is listening on
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn png_image() -> ImagePayload {
    ImagePayload::from_bytes(PNG_BYTES, Some("fundus.png".to_string()), 1024 * 1024).unwrap()
}

/// Class 2 response with the reference score table
pub fn moderate_response() -> Value {
    json!({
        "prediction_class": 2,
        "confidence_scores": {"0": 0.05, "1": 0.15, "2": 0.65, "3": 0.12, "4": 0.03},
        "explanation": "Prediction: Class 2\nConfidence: 65.00%\n\nModerate NPDR detected.",
        "gradcam_image": "data:image/png;base64,iVBORw0KGgo="
    })
}

pub fn session_for(user_id: &str, token: &str) -> Session {
    Session {
        user: User { id: user_id.to_string(), email: Some(format!("{}@example.com", user_id)) },
        access_token: token.to_string(),
        refresh_token: None,
        expires_at: None,
    }
}
