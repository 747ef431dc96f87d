//! Sentence-group chunking and file selection for ingestion.
//!
//! Text is cut after every `". "` and consecutive units are grouped into
//! chunks. Nothing smarter than that: no abbreviation handling, no overlap.

use std::num::NonZeroUsize;
use std::path::Path;

/// Literal sequence that ends a sentence-like unit.
pub const SENTENCE_TERMINATOR: &str = ". ";

/// Configuration for splitting documents into chunks
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Number of sentence-like units per chunk
    pub sentences_per_chunk: NonZeroUsize,
    /// File extensions (without the dot) selected for ingestion. Empty selects
    /// every non-hidden file.
    pub extensions: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            sentences_per_chunk: NonZeroUsize::MIN,
            extensions: vec!["txt".to_string()],
        }
    }
}

impl ChunkerConfig {
    pub fn new(sentences_per_chunk: NonZeroUsize) -> Self {
        Self {
            sentences_per_chunk,
            ..Self::default()
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

/// Stateless sentence-group chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split a document into chunks of up to `sentences_per_chunk` units.
    pub fn split(&self, text: &str) -> Vec<String> {
        split(text, self.config.sentences_per_chunk)
    }

    /// Check if a file should be ingested based on its name
    pub fn should_ingest(&self, file_path: &Path) -> bool {
        let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if filename.starts_with('.') {
            return false;
        }
        if self.config.extensions.is_empty() {
            return true;
        }

        match file_path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => self
                .config
                .extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Segment `text` on [`SENTENCE_TERMINATOR`] and group consecutive units.
///
/// Units are joined back with the terminator they were split on, so the
/// concatenation of all chunks differs from `text` only where a chunk boundary
/// fell on a terminator: the period stays on the chunk it ends and the space
/// after it is dropped. The last chunk may hold fewer units. No overlap.
pub fn split(text: &str, unit_size: NonZeroUsize) -> Vec<String> {
    let units: Vec<&str> = text.split_inclusive(SENTENCE_TERMINATOR).collect();

    units
        .chunks(unit_size.get())
        .map(|group| {
            let joined = group.concat();
            match joined.strip_suffix(SENTENCE_TERMINATOR) {
                Some(head) => format!("{head}."),
                None => joined,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn test_split_pairs_of_sentences() {
        let text = "This is a test. It has multiple sentences. We want to split it.";
        let chunks = split(text, n(2));

        assert_eq!(
            chunks,
            vec![
                "This is a test. It has multiple sentences.",
                "We want to split it."
            ]
        );
    }

    #[test]
    fn test_split_single_units_and_large_groups() {
        let text = "One. Two. Three";
        assert_eq!(split(text, n(1)), vec!["One.", "Two.", "Three"]);
        assert_eq!(split(text, n(10)), vec!["One. Two. Three"]);
    }

    #[test]
    fn test_split_edge_cases() {
        assert!(split("", n(3)).is_empty());
        // abbreviations without a following space are not terminators
        assert_eq!(split("Version 1.2 is out.", n(1)), vec!["Version 1.2 is out."]);
        // trailing terminator does not produce an empty chunk
        assert_eq!(split("Ends here. ", n(1)), vec!["Ends here."]);
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "A. B. C. D. E.";
        assert_eq!(split(text, n(2)), split(text, n(2)));
        assert_eq!(split(text, n(2)).len(), 3);
    }

    #[test]
    fn test_should_ingest() {
        let chunker = Chunker::new(ChunkerConfig::default());

        assert!(chunker.should_ingest(Path::new("docs/notes.txt")));
        assert!(chunker.should_ingest(Path::new("UPPER.TXT")));

        assert!(!chunker.should_ingest(Path::new("readme.md")));
        assert!(!chunker.should_ingest(Path::new(".hidden.txt")));
        assert!(!chunker.should_ingest(Path::new("README")));

        let chunker = Chunker::new(ChunkerConfig::default().with_extensions([".md", "txt"]));
        assert!(chunker.should_ingest(Path::new("readme.md")));

        let chunker = Chunker::new(ChunkerConfig::default().with_extensions(Vec::<String>::new()));
        assert!(chunker.should_ingest(Path::new("README")));
        assert!(!chunker.should_ingest(Path::new(".env")));
    }
}
