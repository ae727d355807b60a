use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_CHUNK_MAX_CHARS: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub separator: char,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_MAX_CHARS,
            overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
            separator: '\n',
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// A contiguous slice of a document's text.
///
/// `start` and `end` are byte offsets into the source text. `overlap_chars`
/// is how many leading characters are shared with the previous chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub overlap_chars: usize,
}

impl Chunk {
    /// Text used for embedding and retrieval.
    pub fn content(&self) -> &str {
        self.text.trim()
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    end: usize,
    chars: usize,
}

fn split_units(text: &str, separator: char) -> Vec<Unit> {
    let mut units = Vec::new();
    let mut offset = 0;
    for piece in text.split_inclusive(separator) {
        units.push(Unit {
            start: offset,
            end: offset + piece.len(),
            chars: piece.chars().count(),
        });
        offset += piece.len();
    }
    units
}

/// Splits `text` into overlapping chunks of at most `max_chars` characters.
///
/// Separator-delimited units are accumulated greedily; a unit longer than
/// `max_chars` becomes a chunk of its own. Each new chunk restarts from the
/// longest tail of whole units of the previous chunk that fits in
/// `overlap_chars`.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    let units = split_units(text, config.separator);
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut window: VecDeque<Unit> = VecDeque::new();
    let mut total = 0usize;

    for unit in units {
        if total + unit.chars > config.max_chars && !window.is_empty() {
            push_chunk(text, &window, &mut chunks);

            while total > config.overlap_chars
                || (total > 0 && total + unit.chars > config.max_chars)
            {
                match window.pop_front() {
                    Some(dropped) => total -= dropped.chars,
                    None => break,
                }
            }
        }

        window.push_back(unit);
        total += unit.chars;
    }

    if !window.is_empty() {
        push_chunk(text, &window, &mut chunks);
    }

    Ok(chunks)
}

fn push_chunk(text: &str, window: &VecDeque<Unit>, chunks: &mut Vec<Chunk>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };

    let start = first.start;
    let end = last.end;
    let overlap_chars = match chunks.last() {
        Some(previous) if previous.end > start => text[start..previous.end].chars().count(),
        _ => 0,
    };

    chunks.push(Chunk {
        index: chunks.len(),
        text: text[start..end].to_string(),
        start,
        end,
        overlap_chars,
    });
}

/// Concatenates chunks with each chunk's overlap prefix removed.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut output = String::new();
    for chunk in chunks {
        let fresh: String = chunk.text.chars().skip(chunk.overlap_chars).collect();
        output.push_str(&fresh);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
            separator: '\n',
        }
    }

    fn sample_document() -> String {
        (0..60)
            .map(|line| format!("Line {line} describes pump pressure and valve timing."))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn chunks_reassemble_into_original_text() {
        let text = sample_document();
        let chunks = split_text(&text, config(200, 60)).expect("valid config");

        assert!(chunks.len() > 1);
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn chunks_respect_size_and_are_never_empty() {
        let text = sample_document();
        let chunks = split_text(&text, config(200, 60)).expect("valid config");

        for chunk in &chunks {
            assert!(!chunk.text.is_empty());
            assert!(chunk.char_len() <= 200);
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn consecutive_chunks_share_an_overlap() {
        let text = sample_document();
        let chunks = split_text(&text, config(200, 60)).expect("valid config");

        assert_eq!(chunks[0].overlap_chars, 0);
        for pair in chunks.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            assert!(next.overlap_chars > 0);
            assert!(next.overlap_chars <= 60);
            assert!(next.start < previous.end);
            let shared: String = next.text.chars().take(next.overlap_chars).collect();
            assert!(previous.text.ends_with(&shared));
        }
    }

    #[test]
    fn oversized_unit_is_passed_through_whole() {
        let long_line = "x".repeat(350);
        let text = format!("short intro\n{long_line}\nshort outro");
        let chunks = split_text(&text, config(100, 20)).expect("valid config");

        assert!(chunks.iter().any(|chunk| chunk.text.contains(&long_line)));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn multibyte_text_is_measured_in_chars() {
        let text = "é".repeat(40) + "\n" + &"ü".repeat(40) + "\n" + &"ø".repeat(40);
        let chunks = split_text(&text, config(90, 10)).expect("valid config");

        assert_eq!(chunks.len(), 2);
        assert_eq!(reassemble(&chunks), text);
    }

    /// Deterministic documents mixing short, empty, oversized and
    /// multibyte lines, with and without a trailing newline.
    fn generated_documents() -> Vec<String> {
        let pieces = ["", "a", "pump", "valve timing", "é ü ø", "日本語のテキスト", " ", "\t"];
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        (0..40)
            .map(|_| {
                let lines = (next() % 30) as usize;
                let mut text = (0..lines)
                    .map(|_| match next() % 10 {
                        0 => String::new(),
                        1 => "x".repeat(50 + (next() % 200) as usize),
                        _ => {
                            let repeat = 1 + (next() % 12) as usize;
                            pieces[(next() % pieces.len() as u64) as usize].repeat(repeat)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                if next() % 2 == 0 {
                    text.push('\n');
                }
                text
            })
            .collect()
    }

    #[test]
    fn generated_documents_reassemble_without_empty_chunks() {
        let configs = [(1, 0), (10, 0), (10, 9), (40, 15), (120, 30), (1_000, 200)];

        for text in generated_documents() {
            for (max_chars, overlap_chars) in configs {
                let chunks = split_text(&text, config(max_chars, overlap_chars)).expect("valid config");

                assert_eq!(reassemble(&chunks), text, "max={max_chars} overlap={overlap_chars}");
                assert_eq!(chunks.is_empty(), text.is_empty());
                for chunk in &chunks {
                    assert!(!chunk.text.is_empty());
                    assert_eq!(&text[chunk.start..chunk.end], chunk.text);
                    let single_unit = chunk.text.trim_end_matches('\n').find('\n').is_none();
                    assert!(chunk.char_len() <= max_chars || single_unit);
                }
            }
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("The capital of France is Paris", ChunkingConfig::default())
            .expect("valid config");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content(), "The capital of France is Paris");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = split_text("", ChunkingConfig::default()).expect("valid config");
        assert!(chunks.is_empty());
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        let error = split_text("abc", config(100, 100)).unwrap_err();
        assert!(matches!(error, IngestError::InvalidChunkConfig(_)));
        assert!(split_text("abc", config(0, 0)).is_err());
    }
}
