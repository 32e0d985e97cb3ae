use chrono::Utc;
use rand::RngCore;

/// Builds a key of the shape `YYYY/MM/<safe-user-id>/<prefix>_<epoch-ms>_<random-hex>`
/// (§4.C). The trailing random component carries 64 bits of entropy, making
/// the key unguessable enough to double as a capability token.
pub fn build_key(user_id: &str, prefix: &str) -> String {
    let now = Utc::now();
    let safe_user_id = safe_user_id(user_id);
    let epoch_ms = now.timestamp_millis();

    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let random_hex = hex::encode(bytes);

    format!(
        "{:04}/{:02}/{}/{}_{}_{}",
        now.format("%Y"),
        now.format("%m"),
        safe_user_id,
        prefix,
        epoch_ms,
        random_hex,
    )
}

fn safe_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .take(50)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_has_expected_shape() {
        let key = build_key("user/../123!!", "upload");
        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[1].len(), 2);
        assert_eq!(parts[2], "user123");
        let tail: Vec<&str> = parts[3].split('_').collect();
        assert_eq!(tail[0], "upload");
        assert_eq!(tail[2].len(), 16); // 8 bytes hex-encoded = 64 bits
    }

    #[test]
    fn user_id_is_truncated_and_sanitized() {
        let long_id = "a".repeat(80);
        let key = build_key(&long_id, "p");
        let user_segment = key.split('/').nth(2).unwrap();
        assert_eq!(user_segment.len(), 50);
    }

    #[test]
    fn keys_are_unique() {
        let a = build_key("u1", "p");
        let b = build_key("u1", "p");
        assert_ne!(a, b);
    }
}
