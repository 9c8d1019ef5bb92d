use sha2::{Digest, Sha256};

use crate::models::UserId;

/// Truncates a string to max_chars characters, appending "..." if truncated.
/// Safe for UTF-8 multi-byte characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncate_at = max_chars.saturating_sub(3);
        let byte_index = s
            .char_indices()
            .nth(truncate_at)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        format!("{}...", &s[..byte_index])
    }
}

/// Keeps the trailing max_chars characters of a string, prefixing "…" when
/// anything was dropped. The most recent output is the most relevant, so
/// truncation always happens from the head.
pub fn tail_chars(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(1);
    let tail: String = s.chars().skip(count - keep).collect();
    format!("…{}", tail)
}

/// Derive the default multiplexer session name for a user.
/// This is the canonical mapping from user ids to session names; the result
/// always satisfies the session-name charset invariant.
pub fn default_session_name(prefix: &str, user_id: UserId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.to_le_bytes());
    let result = hasher.finalize();

    format!("{}-{}", prefix, hex::encode(&result[..4]))
}
