//! Utility functions and helpers.

pub mod http;

use sha2::{Digest, Sha256};

/// Short hex fingerprint of some content, for log lines and alert summaries.
pub fn fingerprint(content: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(content.as_ref());
    hex::encode(&digest[..6])
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint() {
        assert_eq!(fingerprint("A"), fingerprint("A"));
        assert_ne!(fingerprint("A"), fingerprint("B"));
        assert_eq!(fingerprint("").len(), 12);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  c "), "a b c");
        assert_eq!(normalize_whitespace(""), "");
    }
}
