//! Text chunker: splits document text into overlapping windows
//!
//! Windows are measured in characters, not bytes. A window that would end in the
//! middle of a word is pulled back to the nearest preceding whitespace, as long
//! as that whitespace lies past the overlap region; otherwise the window is cut
//! at the raw size.

use thiserror::Error;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    InvalidOverlap { size: usize, overlap: usize },
}

/// Validated chunking parameters: `size > 0` and `overlap < size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    size: usize,
    overlap: usize,
}

impl ChunkConfig {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkError::InvalidOverlap { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split `text` with explicit size/overlap, validating both first.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, ChunkError> {
    let config = ChunkConfig::new(size, overlap)?;
    Ok(split_with(text, &config))
}

/// Split `text` into overlapping chunks.
///
/// Empty text yields no chunks; text no longer than the window yields exactly one.
/// A back-off never lands inside the overlap, so every step advances `start`, and
/// a short step is always followed by a full `size - overlap` step. That keeps
/// the chunk count under `2 * len / (size - overlap) + 2`.
pub fn split_with(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();

    if len == 0 {
        return chunks;
    }

    let mut start = 0usize;
    loop {
        let mut end = (start + config.size).min(len);

        if end < len && !chars[end].is_whitespace() {
            let floor = start + config.overlap;
            let mut cut = end;
            while cut > floor && !chars[cut].is_whitespace() {
                cut -= 1;
            }
            // No whitespace past the overlap: keep the raw cut
            if cut > floor {
                end = cut;
            }
        }

        chunks.push(chars[start..end].iter().collect());

        if end >= len {
            break;
        }

        // end > start + overlap here, so this always moves forward
        start = end - config.overlap;
    }

    chunks
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_short_text_yields_single_chunk() {
        let chunks = split_text("hello world", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(split_text("", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn test_repeated_pairs_cover_all_characters() {
        let text = "a ".repeat(600);
        let chunks = split_text(&text, 1000, 200).unwrap();

        assert_eq!(chunks.len(), 2);
        // First window backs off the 'a' at index 1000 to the space at 999
        assert_eq!(chunks[0].chars().count(), 999);
        // Second window starts 200 characters before the first one ended
        assert_eq!(chunks[1].chars().count(), 1200 - 799);
        assert_eq!(reconstruct(&chunks, 200), text);
    }

    #[test]
    fn test_2500_characters_yield_three_chunks() {
        let text = "word ".repeat(500);
        assert_eq!(text.chars().count(), 2500);

        let chunks = split_text(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(reconstruct(&chunks, 200), text);
    }

    #[test]
    fn test_never_splits_inside_a_word_when_whitespace_exists() {
        let vocabulary = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"];
        let text = format!("{} ", vocabulary.join(" ")).repeat(40);
        let chunks = split_text(&text, 100, 20).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks[..chunks.len() - 1] {
            let last_word = chunk.split_whitespace().last().unwrap();
            assert!(
                vocabulary.contains(&last_word),
                "chunk ended mid-word: {:?}",
                chunk
            );
        }
    }

    #[test]
    fn test_unbroken_text_falls_back_to_raw_cut() {
        let text = "x".repeat(2500);
        let chunks = split_text(&text, 1000, 200).unwrap();

        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 1000);
        assert_eq!(reconstruct(&chunks, 200), text);
    }

    #[test]
    fn test_multibyte_characters_are_not_split() {
        let text = "é".repeat(30);
        let chunks = split_text(&text, 10, 2).unwrap();
        assert!(chunks.iter().all(|c| c.chars().all(|ch| ch == 'é')));
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_overlap_equal_to_size_is_rejected() {
        assert_eq!(
            split_text("anything", 100, 100),
            Err(ChunkError::InvalidOverlap {
                size: 100,
                overlap: 100
            })
        );
        assert!(split_text("anything", 100, 150).is_err());
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert_eq!(split_text("anything", 0, 0), Err(ChunkError::ZeroSize));
    }

    #[test]
    fn test_terminates_within_expected_window_count() {
        let text = "lorem ipsum dolor sit amet ".repeat(400);
        let len = text.chars().count();
        let chunks = split_text(&text, 300, 100).unwrap();

        let bound = len / (300 - 100) + 2;
        assert!(chunks.len() <= bound, "{} chunks exceeds bound {}", chunks.len(), bound);
    }

    #[test]
    fn test_whitespace_inside_overlap_is_not_used_as_cut() {
        let text = format!("ab {}", "c".repeat(40));
        let chunks = split_text(&text, 10, 8).unwrap();
        assert!(chunks.last().unwrap().ends_with('c'));
        assert!(chunks.len() <= 2 * 43 / 2 + 2);
        assert_eq!(reconstruct(&chunks, 8), text);
    }

    #[test]
    fn test_long_unbroken_tokens_stay_within_window_bound() {
        // Each 1200-char block has its only space 199 chars in, well inside the overlap
        let text = format!("{} {}", "a".repeat(199), "b".repeat(1000)).repeat(5);
        let len = text.chars().count();
        assert_eq!(len, 6000);

        let chunks = split_text(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 10);
        assert!(chunks.len() <= 2 * len / (1000 - 200) + 2);

        let embedded: usize = chunks.iter().map(|c| c.chars().count()).sum();
        assert_eq!(embedded, 7800);
        assert_eq!(reconstruct(&chunks, 200), text);
    }
}
