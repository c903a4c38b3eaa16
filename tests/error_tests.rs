//! 错误处理单元测试
//!
//! 测试应用错误类型的状态码、错误码、消息与响应信封

use admin_auth::auth::jwt::TokenError;
use admin_auth::error::{AppError, ErrorResponse};
use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use http_body_util::BodyExt;

// ==================== 错误状态码测试 ====================

#[test]
fn test_error_status_codes() {
    assert_eq!(
        AppError::Token(TokenError::Malformed).status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        AppError::InvalidRefreshToken(TokenError::Expired).status_code(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(AppError::AuthenticationFailed.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        AppError::RateLimited { retry_after_secs: 10 }.status_code(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(AppError::NotFound("user".to_string()).status_code(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::Validation("error".to_string()).status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        AppError::Timeout("find user".to_string()).status_code(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[test]
fn test_server_error_status_codes() {
    assert_eq!(
        AppError::Database(sqlx::Error::RowNotFound).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        AppError::Config("Invalid config".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        AppError::Internal("Something went wrong".to_string()).status_code(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// ==================== 错误码测试 ====================

#[test]
fn test_token_error_codes() {
    assert_eq!(AppError::Token(TokenError::Malformed).error_code(), "TOKEN_MALFORMED");
    assert_eq!(AppError::Token(TokenError::Expired).error_code(), "TOKEN_EXPIRED");
    assert_eq!(AppError::Token(TokenError::Invalid).error_code(), "TOKEN_INVALID");
    assert_eq!(
        AppError::InvalidRefreshToken(TokenError::Expired).error_code(),
        "INVALID_REFRESH_TOKEN"
    );
}

#[test]
fn test_numeric_codes() {
    assert_eq!(AppError::AuthenticationFailed.code(), 401);
    assert_eq!(AppError::RateLimited { retry_after_secs: 1 }.code(), 429);
    assert_eq!(AppError::NotFound("test".to_string()).code(), 404);
    assert_eq!(AppError::Validation("test".to_string()).code(), 400);
    assert_eq!(AppError::Timeout("test".to_string()).code(), 503);
    assert_eq!(AppError::Internal("test".to_string()).code(), 500);
}

// ==================== 用户消息测试 ====================

#[test]
fn test_user_messages_no_sensitive_info() {
    let db_error = AppError::Database(sqlx::Error::RowNotFound);
    let message = db_error.user_message();
    assert_eq!(message, "Internal server error");
    assert!(!message.to_lowercase().contains("sqlx"));

    let config_error = AppError::Config("Missing JWT secret".to_string());
    assert!(!config_error.user_message().contains("JWT"));

    let timeout = AppError::Timeout("count login failures".to_string());
    assert_eq!(timeout.user_message(), "Service temporarily unavailable");

    // 不区分具体资源
    assert_eq!(AppError::not_found("alice").user_message(), "Resource not found");
}

#[test]
fn test_authentication_failed_message_is_fixed() {
    assert_eq!(
        AppError::AuthenticationFailed.user_message(),
        "Invalid username or password"
    );
}

#[test]
fn test_rate_limited_message_carries_retry() {
    let err = AppError::RateLimited { retry_after_secs: 120 };
    assert_eq!(
        err.user_message(),
        "Too many failed login attempts. Please try again after 120 seconds."
    );
}

// ==================== 便捷方法测试 ====================

#[test]
fn test_convenience_methods() {
    assert!(matches!(AppError::not_found("User"), AppError::NotFound(ref m) if m == "User"));
    assert!(matches!(
        AppError::timeout("find user"),
        AppError::Timeout(ref m) if m == "find user"
    ));
}

#[test]
fn test_into_refresh_failure() {
    assert!(matches!(
        AppError::Token(TokenError::Expired).into_refresh_failure(),
        AppError::InvalidRefreshToken(TokenError::Expired)
    ));
    assert!(matches!(
        AppError::NotFound("x".to_string()).into_refresh_failure(),
        AppError::NotFound(_)
    ));
}

#[test]
fn test_from_token_error() {
    let err: AppError = TokenError::Malformed.into();
    assert!(matches!(err, AppError::Token(TokenError::Malformed)));
}

// ==================== 响应信封测试 ====================

#[test]
fn test_error_response_serialization() {
    let body = ErrorResponse::new(StatusCode::UNAUTHORIZED, "TOKEN_INVALID", "Invalid token");
    let json = serde_json::to_value(&body).unwrap();

    assert_eq!(json["status"], 401);
    assert_eq!(json["error"], "Unauthorized");
    assert_eq!(json["code"], "TOKEN_INVALID");
    assert_eq!(json["message"], "Invalid token");
    assert!(json["date"].is_string());
    assert!(json.get("data").is_none());
}

#[test]
fn test_error_response_with_data() {
    let body = ErrorResponse::new(StatusCode::UNAUTHORIZED, "TOKEN_REFRESHED", "refreshed")
        .with_data(serde_json::json!({ "access_token": "abc" }));
    let json = serde_json::to_value(&body).unwrap();

    assert_eq!(json["data"]["access_token"], "abc");
}

#[tokio::test]
async fn test_into_response_rate_limited() {
    let response = AppError::RateLimited { retry_after_secs: 42 }.into_response();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "RATE_LIMITED");
    assert_eq!(json["status"], 429);
}

#[tokio::test]
async fn test_into_response_internal_hides_detail() {
    let response = AppError::Internal("secret stack detail".to_string()).into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("secret stack detail"));
    assert!(text.contains("INTERNAL_ERROR"));
}
