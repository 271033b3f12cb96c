//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted player name, in characters.
pub const MAX_PLAYER_NAME_LEN: usize = 32;

/// Validates a player name: 1 to 32 characters once trimmed, no control characters.
///
/// # Examples
///
/// ```ignore
/// validate_player_name("alice")     // Ok
/// validate_player_name("   ")       // Err - blank
/// validate_player_name("bob\n")     // Ok - trimmed first
/// validate_player_name("b\u{7}ob")  // Err - control character
/// ```
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();

    if length == 0 || length > MAX_PLAYER_NAME_LEN {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be 1 to {MAX_PLAYER_NAME_LEN} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    if trimmed.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Player name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_name_valid() {
        assert!(validate_player_name("alice").is_ok());
        assert!(validate_player_name("  padded  ").is_ok());
        assert!(validate_player_name("Zoë 2").is_ok());
        assert!(validate_player_name(&"x".repeat(MAX_PLAYER_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_validate_player_name_invalid_length() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name(&"x".repeat(MAX_PLAYER_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_player_name_invalid_format() {
        assert!(validate_player_name("bo\u{7}b").is_err());
        assert!(validate_player_name("a\tb").is_err());
    }
}
