use crate::error::{AppError, AppResult};
use axum::extract::rejection::JsonRejection;
use axum::Json;

/// Unwrap a JSON body, turning a rejection into a 400 with an `error` field
pub fn json_body<T>(request: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    request
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Parse a numeric path segment such as `:piggy_id`
pub fn parse_id(raw: &str, name: &str) -> AppResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("invalid {}: {}", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42", "piggy_id").unwrap(), 42);
        assert_eq!(parse_id(" 7 ", "piggy_id").unwrap(), 7);

        let err = parse_id("abc", "donation_id").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "invalid donation_id: abc");
    }
}
