use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::llm::types::{StreamChunk, StreamChunkKind};

/// Parses one SSE line of an OpenAI-compatible stream.
/// Keep-alives, comments and non-data lines yield `None`.
pub fn parse_sse_line(line: &str) -> PhoneClawResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| PhoneClawError::SseParsing(e.to_string()))?;

    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Ok(None);
    };
    let delta = &first["delta"];

    if let Some(reasoning) = delta["reasoning_content"].as_str() {
        if !reasoning.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Reasoning,
                content: reasoning.to_string(),
            }));
        }
    }

    if let Some(content) = delta["content"].as_str() {
        if !content.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Content,
                content: content.to_string(),
            }));
        }
    }

    if first["finish_reason"].as_str().is_some() {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    Ok(None)
}

/// Splits a byte stream into SSE lines. Buffers bytes rather than chars so a
/// multi-byte character straddling two chunks survives.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buf: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns every complete, non-blank line in it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// The trailing line of a stream that closed without a final newline.
    pub fn finish(self) -> Option<String> {
        let line = String::from_utf8_lossy(&self.buf).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_delta() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{"content":"do(act"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Content);
        assert_eq!(chunk.content, "do(act");
    }

    #[test]
    fn reasoning_delta_wins_over_empty_content() {
        let chunk = parse_sse_line(
            r#"data: {"choices":[{"delta":{"reasoning_content":"hmm","content":""}}]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Reasoning);
    }

    #[test]
    fn done_markers() {
        let done = parse_sse_line("data: [DONE]").unwrap().unwrap();
        assert_eq!(done.kind, StreamChunkKind::Done);
        let finish = parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(finish.kind, StreamChunkKind::Done);
    }

    #[test]
    fn keep_alives_and_junk() {
        assert!(parse_sse_line("").unwrap().is_none());
        assert!(parse_sse_line(": ping").unwrap().is_none());
        assert!(parse_sse_line("event: message").unwrap().is_none());
        assert!(matches!(
            parse_sse_line("data: {not json"),
            Err(PhoneClawError::SseParsing(_))
        ));
    }

    #[test]
    fn line_buffer_joins_split_chunks() {
        let mut lines = SseLineBuffer::new();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        assert_eq!(lines.push(b":1}\n\n: ping\r\n"), vec!["data: {\"a\":1}", ": ping"]);
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_multibyte_chars_across_chunks() {
        let bytes = "data: 向上\n".as_bytes();
        let mut lines = SseLineBuffer::new();
        assert!(lines.push(&bytes[..8]).is_empty());
        assert_eq!(lines.push(&bytes[8..]), vec!["data: 向上"]);
    }

    #[test]
    fn unterminated_last_line_is_flushed() {
        let mut lines = SseLineBuffer::new();
        let first = lines.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\ndata: [DONE]");
        assert_eq!(first.len(), 1);
        let last = lines.finish().unwrap();
        assert_eq!(last, "data: [DONE]");
        let chunk = parse_sse_line(&last).unwrap().unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Done);
    }
}
