// Stable link identifiers

use tracing::debug;

/// Derive the persistent identifier of a link.
///
/// The id is `link_{hash}_{document}` where `hash` is the absolute value of a
/// 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over the UTF-16 code
/// units of `"{document}|{url}|{text}"`, and `document` is the document path
/// with its first `.md` removed and every non-alphanumeric character replaced
/// by `_`. The web edition of the study page stores the same ids, so progress
/// exported from a browser keeps working.
///
/// Collisions: the hash has 2^32 values (2^31 after taking the absolute
/// value), and the suffix confines any collision to links of the same
/// document. For `n` links in one document the chance of any collision is
/// roughly `n^2 / 2^32`; about 0.02% for a thousand links.
pub fn derive_id(document_path: &str, url: &str, text: &str) -> String {
    let composite = format!("{}|{}|{}", document_path, url, text);
    let id = format!(
        "link_{}_{}",
        rolling_hash(&composite).unsigned_abs(),
        sanitize_document(document_path)
    );
    debug!("Generated ID for \"{}\" in {}: {}", text, document_path, id);
    id
}

fn rolling_hash(input: &str) -> i32 {
    input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

fn sanitize_document(document_path: &str) -> String {
    document_path
        .replacen(".md", "", 1)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_hash_matches_java_string_hash() {
        // h = h * 31 + c, the same recurrence as java.lang.String#hashCode
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 97 * 31 + 98);
        assert_eq!(rolling_hash("hello"), 99162322);
    }

    #[test]
    fn test_rolling_hash_wraps() {
        // long enough to overflow many times; must not panic
        let long = "x".repeat(10_000);
        let _ = rolling_hash(&long);
    }

    #[test]
    fn test_sanitize_document() {
        assert_eq!(
            sanitize_document("content/01_tokenization.md"),
            "content_01_tokenization"
        );
        assert_eq!(sanitize_document("a.md.md"), "a_md");
    }

    #[test]
    fn test_id_shape() {
        let id = derive_id("content/a.md", "https://example.com/", "Example");
        assert!(id.starts_with("link_"));
        assert!(id.ends_with("_content_a"));
    }
}
