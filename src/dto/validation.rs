//! Validation helpers for DTOs.

use validator::ValidationError;

/// Number of characters in a room code.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Uppercase a user supplied room code and strip surrounding whitespace.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Validates that a room code is exactly 6 uppercase alphanumeric characters.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("K3ZQ8A") // Ok
/// validate_room_code("k3zq8a") // Err - lowercase, normalize first
/// validate_room_code("K3ZQ8")  // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != ROOM_CODE_LENGTH {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!(
                "Room code must be exactly {ROOM_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only uppercase letters and digits".into());
        return Err(err);
    }

    Ok(())
}
