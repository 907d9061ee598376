
use tracing::debug;

use crate::config::ChunkingConfig;

/// Separators tried in order, coarsest first. The empty string means
/// character-level splitting as the last resort.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Recursive character text splitter.
///
/// Splits on the coarsest separator that keeps pieces under the target
/// size, recursing into finer separators for oversized pieces, then merges
/// adjacent pieces back together with the configured overlap. Deterministic
/// for a fixed input and configuration.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
        }
    }

    /// Split `text` into chunks of at most `chunk_size` characters, with
    /// `chunk_overlap` characters shared between adjacent chunks where the
    /// separator structure allows it.
    #[inline]
    pub fn split(&self, text: &str) -> Vec<String> {
        let chunks = self.split_with(text, SEPARATORS);
        debug!("Split {} chars into {} chunks", text.chars().count(), chunks.len());
        chunks
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator that appears in the text; "" always matches.
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };

        let mut chunks = Vec::new();
        let mut mergeable: Vec<String> = Vec::new();

        for piece in pieces {
            if piece.chars().count() < self.chunk_size {
                mergeable.push(piece);
                continue;
            }

            if !mergeable.is_empty() {
                chunks.extend(self.merge(&mergeable, separator));
                mergeable.clear();
            }

            // Oversized piece: recurse into finer separators if any remain
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }

        if !mergeable.is_empty() {
            chunks.extend(self.merge(&mergeable, separator));
        }

        chunks
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Greedily join pieces up to the chunk size, carrying `chunk_overlap`
    /// worth of trailing pieces into the next chunk.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = separator.chars().count();
        let mut merged = Vec::new();
        let mut window: Vec<&String> = Vec::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let piece_len = piece.chars().count();

            if window_len + piece_len + window.len().min(1) * sep_len > self.chunk_size
                && !window.is_empty()
            {
                merged.push(Self::join(&window, separator));

                // Drop leading pieces until the carried-over tail fits the overlap
                while window_len > self.chunk_overlap
                    || (window_len + piece_len + window.len().min(1) * sep_len > self.chunk_size
                        && window_len > 0)
                {
                    let Some(first) = window.first() else { break };
                    window_len -= first.chars().count() + if window.len() > 1 { sep_len } else { 0 };
                    window.remove(0);
                }
            }

            window_len += piece_len + if window.is_empty() { 0 } else { sep_len };
            window.push(piece);
        }

        if !window.is_empty() {
            merged.push(Self::join(&window, separator));
        }

        merged
    }

    fn join(pieces: &[&String], separator: &str) -> String {
        pieces
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}
