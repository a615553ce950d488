use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Extensions accepted for upload. Only plain text formats are supported.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "md", "markdown"];

/// Parsed document content
pub struct ParsedDocument {
    pub content: String,
    pub file_type: String,
}

/// Lowercased extension of `path`, or an error when it is not accepted.
pub fn accepted_extension(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(Error::UnsupportedFileType(ext))
    }
}

/// Parse a document file into plain text
pub fn parse_file(path: &Path) -> Result<ParsedDocument> {
    let file_type = accepted_extension(path)?;
    let content = fs::read_to_string(path)?;
    Ok(ParsedDocument { content, file_type })
}

/// Approximate token count: whitespace-delimited words.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into chunks of at most `max_tokens` tokens, breaking on line
/// boundaries where possible and on word boundaries for over-long lines.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_tokens = max_tokens.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0;

    for line in text.lines() {
        let tokens = count_tokens(line);
        if tokens == 0 {
            continue;
        }
        if tokens > max_tokens {
            flush(&mut current, &mut chunks);
            current_tokens = 0;
            let words: Vec<&str> = line.split_whitespace().collect();
            for piece in words.chunks(max_tokens) {
                chunks.push(piece.join(" "));
            }
            continue;
        }
        if current_tokens + tokens > max_tokens {
            flush(&mut current, &mut chunks);
            current_tokens = 0;
        }
        current.push(line);
        current_tokens += tokens;
    }
    flush(&mut current, &mut chunks);

    chunks
}

fn flush(current: &mut Vec<&str>, chunks: &mut Vec<String>) {
    let chunk = current.join("\n").trim().to_string();
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_short() {
        let chunks = chunk_text("Hello world", 100);
        assert_eq!(chunks, vec!["Hello world"]);
    }

    #[test]
    fn test_chunk_text_respects_limit() {
        let text = (0..50)
            .map(|i| format!("line {} has five words", i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_text(&text, 12);
        assert_eq!(chunks.len(), 25);
        assert!(chunks.iter().all(|c| count_tokens(c) <= 12));
    }

    #[test]
    fn test_chunk_text_splits_long_line() {
        let line = vec!["word"; 25].join(" ");
        let chunks = chunk_text(&line, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(count_tokens(&chunks[2]), 5);
    }

    #[test]
    fn test_chunk_text_skips_blank() {
        assert!(chunk_text("  \n\n\t", 10).is_empty());
    }

    #[test]
    fn test_accepted_extension() {
        assert_eq!(accepted_extension(Path::new("a/Syllabus.TXT")).unwrap(), "txt");
        assert!(matches!(
            accepted_extension(Path::new("slides.pdf")),
            Err(Error::UnsupportedFileType(ext)) if ext == "pdf"
        ));
    }
}
