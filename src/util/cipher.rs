//! XOR-chain cipher for the payload trailer string.
//!
//! Obfuscation, not security: each ciphertext byte is chained into the next
//! so the text is awkward to edit with a hex editor, nothing more.

const KEY: &[u8] = b"F-JaNcRfUjXn2r5u8x/A?D(G+KbPeSgV";

/// Encrypt a string into trailer bytes.
pub fn encrypt(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut prev = 0u8;
    for (i, byte) in text.bytes().enumerate() {
        let c = byte ^ prev ^ KEY[i % KEY.len()];
        out.push(c);
        prev = c;
    }
    out
}

/// Decrypt trailer bytes back into a string.
///
/// Returns an empty string for empty input or undecodable bytes, matching
/// the tolerant behavior expected of an optional author field.
pub fn decrypt(data: &[u8]) -> String {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0u8;
    for (i, byte) in data.iter().enumerate() {
        out.push(byte ^ prev ^ KEY[i % KEY.len()]);
        prev = *byte;
    }
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for text in ["", "a", "author name", "somewhat longer string to cycle the key around twice at least, yes really"] {
            assert_eq!(decrypt(&encrypt(text)), text);
        }
    }

    #[test]
    fn test_chained_bytes_differ() {
        // repeated plaintext must not produce repeated ciphertext
        let enc = encrypt("aaaa");
        assert_ne!(enc[0], enc[1]);
    }
}
