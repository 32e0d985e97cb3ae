use occ_core::types::Message;
use occ_memory::Memory;

/// Per-message overhead charged on top of content + role tokens (§4.E).
const MESSAGE_OVERHEAD: u32 = 3;
/// Per-memory overhead charged on top of content/summary/entity tokens.
const MEMORY_OVERHEAD: u32 = 5;
/// Token cost charged per entity in a memory's entity set.
const MEMORY_ENTITY_TOKENS: u32 = 2;

/// `ceil(length_in_chars / 4)`, the no-tokenizer content estimate (§4.E).
pub fn estimate_chars(s: &str) -> u32 {
    ((s.chars().count() as u32) + 3) / 4
}

/// `content + role(1) + overhead(3)` (§4.E).
pub fn estimate_message_tokens(message: &Message) -> u32 {
    estimate_chars(&message.content) + 1 + MESSAGE_OVERHEAD
}

/// Prefers the memory's own stored token count when present; otherwise
/// `content + summary + 2*|entities| + 5` (§4.E).
pub fn estimate_memory_tokens(memory: &Memory) -> u32 {
    if memory.token_count > 0 {
        return memory.token_count;
    }
    let content = estimate_chars(&memory.content);
    let summary = memory.summary.as_deref().map(estimate_chars).unwrap_or(0);
    let entities = memory.entities.len() as u32 * MEMORY_ENTITY_TOKENS;
    content + summary + entities + MEMORY_OVERHEAD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_estimate_rounds_up() {
        assert_eq!(estimate_chars(""), 0);
        assert_eq!(estimate_chars("abc"), 1);
        assert_eq!(estimate_chars("abcd"), 1);
        assert_eq!(estimate_chars("abcde"), 2);
    }
}
