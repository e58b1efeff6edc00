//! Word-window chunking and content hashing.

use sha2::{Digest, Sha256};

/// Split `text` into windows of `size` whitespace-separated tokens, each
/// sharing `overlap` tokens with the previous one.
///
/// An `overlap >= size` is clamped to `size - 1` so the window always moves.
pub fn chunk_words(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let size = size.max(1);
    let step = size - overlap.min(size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Stable chunk id: source, page version and position.
pub fn chunk_id(source_url: &str, page_hash: &str, position: usize) -> String {
    let source = content_hash(source_url);
    format!("{}-{}-{position}", &source[..12], &page_hash[..page_hash.len().min(12)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_words("card machine fees", 500, 50);
        assert_eq!(chunks, vec!["card machine fees"]);
    }

    #[test]
    fn windows_overlap() {
        let chunks = chunk_words(&words(10), 4, 1);
        assert_eq!(
            chunks,
            vec!["w0 w1 w2 w3", "w3 w4 w5 w6", "w6 w7 w8 w9"]
        );
    }

    #[test]
    fn default_sizes_cover_every_word() {
        let chunks = chunk_words(&words(1200), 500, 50);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("w0 ") && chunks[0].ends_with(" w499"));
        assert!(chunks[1].starts_with("w450 ") && chunks[1].ends_with(" w949"));
        assert!(chunks[2].starts_with("w900 ") && chunks[2].ends_with(" w1199"));
    }

    #[test]
    fn degenerate_overlap_still_advances() {
        let chunks = chunk_words(&words(5), 2, 10);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3], "w3 w4");
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_words("   \n ", 500, 50).is_empty());
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chunk_ids_change_with_content() {
        let url = "https://help.example.com/fees";
        let a = chunk_id(url, &content_hash("v1"), 0);
        let b = chunk_id(url, &content_hash("v2"), 0);
        assert_ne!(a, b);
        assert!(a.ends_with("-0"));
        assert_eq!(a, chunk_id(url, &content_hash("v1"), 0));
    }
}
