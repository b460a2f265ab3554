//! Method-aware text chunker.
//!
//! Turns the extracted text of a card into an ordered list of retrievable
//! fragments. Chunk 0 is always the whole input, regardless of method, so a
//! card stays findable by its overall gist even when no single sentence
//! matches a query.
//!
//! # Methods
//!
//! | Method | Source text | Fragments after chunk 0 |
//! |--------|-------------|-------------------------|
//! | [`ChunkMethod::Structural`] | markdown | each heading, then each paragraph sentence, in document order |
//! | [`ChunkMethod::Flat`] | free prose | each sentence of the whole input |
//!
//! Sentences end at any of `. ! ? 。 ！ ？`. Pieces are trimmed and empty
//! pieces dropped, so mixed Japanese/English text splits the same way.
//!
//! # Example
//!
//! ```rust
//! use umesao_core::chunk::{chunk, ChunkMethod};
//!
//! let chunks = chunk("# Title\nHello world. Nice day!", ChunkMethod::Structural);
//! assert_eq!(
//!     chunks,
//!     vec!["# Title\nHello world. Nice day!", "Title", "Hello world", "Nice day"]
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Sentence terminators, ASCII and full-width.
const SENTENCE_DELIMITERS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMethod {
    /// Markdown-aware: headings and paragraph sentences.
    Structural,
    /// Structure-blind sentence split.
    Flat,
}

impl fmt::Display for ChunkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkMethod::Structural => f.write_str("structural"),
            ChunkMethod::Flat => f.write_str("flat"),
        }
    }
}

impl FromStr for ChunkMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "structural" => Ok(ChunkMethod::Structural),
            "flat" => Ok(ChunkMethod::Flat),
            other => Err(Error::InvalidInput(format!(
                "unknown chunk method '{}': expected structural or flat",
                other
            ))),
        }
    }
}

/// Split `content` into chunks. The first element is always `content`
/// itself, untouched; every later element is trimmed and non-empty.
pub fn chunk(content: &str, method: ChunkMethod) -> Vec<String> {
    let mut chunks = vec![content.to_string()];
    match method {
        ChunkMethod::Structural => chunks.extend(structural_fragments(content)),
        ChunkMethod::Flat => chunks.extend(split_sentences(content)),
    }
    chunks
}

/// Split text on sentence terminators, trimming and dropping empty pieces.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(|c: char| SENTENCE_DELIMITERS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Which block the walker is currently collecting text for.
enum Block {
    Heading(String),
    Paragraph(String),
}

fn structural_fragments(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Option<Block> = None;

    for event in Parser::new(content) {
        match event {
            Event::Start(Tag::Heading { .. }) => current = Some(Block::Heading(String::new())),
            Event::Start(Tag::Paragraph) => current = Some(Block::Paragraph(String::new())),
            Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Paragraph) => {
                match current.take() {
                    Some(Block::Heading(text)) => {
                        let text = text.trim();
                        if !text.is_empty() {
                            out.push(text.to_string());
                        }
                    }
                    Some(Block::Paragraph(text)) => out.extend(split_sentences(&text)),
                    None => {}
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(Block::Heading(buf) | Block::Paragraph(buf)) = current.as_mut() {
                    buf.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(Block::Heading(buf) | Block::Paragraph(buf)) = current.as_mut() {
                    buf.push(' ');
                }
            }
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_and_sentences() {
        let chunks = chunk("# Title\nHello world. Nice day!", ChunkMethod::Structural);
        assert_eq!(
            chunks,
            vec![
                "# Title\nHello world. Nice day!",
                "Title",
                "Hello world",
                "Nice day"
            ]
        );
    }

    #[test]
    fn test_whole_document_is_first() {
        let content = "  padded text.  ";
        for method in [ChunkMethod::Structural, ChunkMethod::Flat] {
            assert_eq!(chunk(content, method)[0], content);
        }
    }

    #[test]
    fn test_empty_input_yields_only_whole_chunk() {
        assert_eq!(chunk("", ChunkMethod::Structural), vec![""]);
        assert_eq!(chunk("", ChunkMethod::Flat), vec![""]);
    }

    #[test]
    fn test_structural_count_is_one_plus_headings_plus_sentences() {
        // 3 headings, 3 paragraphs holding 2 + 1 + 3 sentences.
        let md = "# Alpha\n\nFirst one. Second one.\n\n## Beta\n\nOnly sentence\n\n### Gamma\n\nA! B? C.";
        let chunks = chunk(md, ChunkMethod::Structural);
        assert_eq!(chunks.len(), 1 + 3 + 6);
        assert_eq!(
            &chunks[1..],
            &[
                "Alpha",
                "First one",
                "Second one",
                "Beta",
                "Only sentence",
                "Gamma",
                "A",
                "B",
                "C"
            ]
        );
    }

    #[test]
    fn test_blank_fragments_are_dropped() {
        let chunks = chunk("Wait... what?!", ChunkMethod::Structural);
        assert_eq!(&chunks[1..], &["Wait", "what"]);
    }

    #[test]
    fn test_japanese_delimiters() {
        let chunks = chunk("今日は晴れ。散歩に行く！楽しい？ Yes.", ChunkMethod::Flat);
        assert_eq!(&chunks[1..], &["今日は晴れ", "散歩に行く", "楽しい", "Yes"]);
    }

    #[test]
    fn test_flat_ignores_markup() {
        let chunks = chunk("# Title\nHello world. Nice day!", ChunkMethod::Flat);
        assert_eq!(&chunks[1..], &["# Title\nHello world", "Nice day"]);
    }

    #[test]
    fn test_flat_plain_prose_count() {
        let text = "A cat sat on a mat. It purred! Was it happy? Probably";
        assert_eq!(chunk(text, ChunkMethod::Flat).len(), 1 + 4);
    }

    #[test]
    fn test_inline_markup_is_flattened() {
        let chunks = chunk(
            "## The *quick* fox\n\nUse `grep` on [the docs](http://x). Then **rest**",
            ChunkMethod::Structural,
        );
        assert_eq!(
            &chunks[1..],
            &["The quick fox", "Use grep on the docs", "Then rest"]
        );
    }

    #[test]
    fn test_soft_break_joins_lines() {
        let chunks = chunk("first line\nsecond line.", ChunkMethod::Structural);
        assert_eq!(&chunks[1..], &["first line second line"]);
    }

    #[test]
    fn test_code_blocks_are_not_chunked() {
        let chunks = chunk("```\nlet x = 1. y = 2.\n```\n", ChunkMethod::Structural);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(
            "structural".parse::<ChunkMethod>().unwrap(),
            ChunkMethod::Structural
        );
        assert_eq!("flat".parse::<ChunkMethod>().unwrap(), ChunkMethod::Flat);
        assert!("header".parse::<ChunkMethod>().is_err());
    }
}
