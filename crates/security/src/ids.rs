//! Format checks for caller-supplied identifiers.

use switchyard_core::{ValidationCode, ValidationError};

pub const MAX_USER_ID_LEN: usize = 50;
pub const MAX_CONVERSATION_ID_LEN: usize = 100;

/// `[A-Za-z0-9_-]{1,max}`
fn is_valid_id(id: &str, max_len: usize) -> bool {
    !id.is_empty()
        && id.len() <= max_len
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if is_valid_id(user_id, MAX_USER_ID_LEN) {
        Ok(())
    } else {
        Err(ValidationError::new(
            ValidationCode::InvalidUserId,
            format!(
                "user_id must be 1-{MAX_USER_ID_LEN} characters of letters, digits, '_' or '-'."
            ),
        ))
    }
}

pub fn validate_conversation_id(conversation_id: &str) -> Result<(), ValidationError> {
    if is_valid_id(conversation_id, MAX_CONVERSATION_ID_LEN) {
        Ok(())
    } else {
        Err(ValidationError::new(
            ValidationCode::InvalidConversationId,
            format!(
                "conversation_id must be 1-{MAX_CONVERSATION_ID_LEN} characters of letters, digits, '_' or '-'."
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_ids() {
        assert!(validate_user_id("client789").is_ok());
        assert!(validate_user_id("user_1-a").is_ok());
        assert!(validate_conversation_id("conv-1234").is_ok());
    }

    #[test]
    fn rejects_malformed_ids() {
        assert_eq!(validate_user_id("").unwrap_err().code, ValidationCode::InvalidUserId);
        assert!(validate_user_id("has space").is_err());
        assert!(validate_user_id("../etc/passwd").is_err());
        assert!(validate_user_id(&"a".repeat(51)).is_err());
        assert!(validate_conversation_id(&"c".repeat(100)).is_ok());
        assert_eq!(
            validate_conversation_id(&"c".repeat(101)).unwrap_err().code,
            ValidationCode::InvalidConversationId
        );
        assert!(validate_conversation_id("café").is_err());
    }
}
