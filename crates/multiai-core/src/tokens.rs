//! Coarse token estimation
//!
//! Roughly one token per four characters of English text. Used wherever a
//! backend does not report exact usage, which always includes intermediate
//! streaming chunks.

use crate::types::ChatMessage;

const CHARS_PER_TOKEN: usize = 4;

/// Approximate token count of `text`. Deterministic and monotonic in length.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Sum of the estimates over every message body
pub fn estimate_prompt_tokens(messages: &[ChatMessage]) -> u32 {
    messages
        .iter()
        .map(|m| estimate_tokens(&m.content))
        .fold(0u32, u32::saturating_add)
}
