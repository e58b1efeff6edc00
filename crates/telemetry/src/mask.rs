//! Identifier masking for log output.

/// Ids shorter than this are masked completely.
const MIN_REVEALING_LEN: usize = 4;

/// Keep a short prefix and replace the rest with `***`.
///
/// The prefix is at most `visible` characters and never more than half the
/// id, so no id is ever logged whole.
pub fn mask_identifier(id: &str, visible: usize) -> String {
    let len = id.chars().count();
    if len == 0 {
        return String::new();
    }
    let shown = if len < MIN_REVEALING_LEN { 0 } else { visible.min(len / 2) };
    let prefix: String = id.chars().take(shown).collect();
    format!("{prefix}***")
}

pub fn mask_user_id(user_id: &str) -> String {
    mask_identifier(user_id, 4)
}

pub fn mask_conversation_id(conversation_id: &str) -> String {
    mask_identifier(conversation_id, 8)
}

/// Shorten free text for a log preview.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ids_still_masked() {
        assert_eq!(mask_user_id("ab"), "***");
        assert_eq!(mask_user_id("u42"), "***");
        assert_eq!(mask_user_id(""), "");
    }

    #[test]
    fn at_most_half_an_id_is_revealed() {
        assert_eq!(mask_conversation_id("conv-123"), "conv***");
        assert_eq!(mask_user_id("user_1"), "use***");
        assert_eq!(mask_user_id("customer_8472"), "cust***");
        assert_eq!(mask_conversation_id("conversation-secret-9"), "conversa***");

        for id in ["abcd", "conv-1", "conv-123", "customer_8472"] {
            let masked = mask_conversation_id(id);
            assert!(!masked.contains(id), "{id} leaked as {masked}");
        }
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("cartão de crédito", 6), "cartão…");
        assert_eq!(preview("pix", 10), "pix");
    }
}
