//! # Payment references
//!
//! Every charge is identified by a reference that is generated here, sent to the gateway when the charge is opened,
//! and used as the idempotency key by every confirmation path afterwards.
//!
//! ```text
//!    ALG_{user_id}_{unix_timestamp}_{random}
//! ```
//!
//! The random suffix (24 bits, hex) keeps two charges opened by the same user in the same second apart.
use chrono::Utc;

pub const REFERENCE_PREFIX: &str = "ALG";

pub fn new_reference(user_id: i64) -> String {
    let suffix = rand::random::<u32>() & 0x00FF_FFFF;
    format!("{REFERENCE_PREFIX}_{user_id}_{}_{suffix:06x}", Utc::now().timestamp())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reference_format() {
        let r = new_reference(42);
        let parts = r.split('_').collect::<Vec<_>>();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "ALG");
        assert_eq!(parts[1], "42");
        assert!(parts[2].parse::<i64>().is_ok());
        assert_eq!(parts[3].len(), 6);
        assert!(r.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn references_are_distinct() {
        let refs = (0..50).map(|_| new_reference(1)).collect::<std::collections::HashSet<_>>();
        assert!(refs.len() > 45);
    }
}
