//! Line and event-block buffering for SSE byte streams.

pub(crate) struct SseBuffer {
    buffer: String,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    pub fn push_bytes(&mut self, chunk: &bytes::Bytes) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
    }

    /// Drain every complete `\n`-terminated line, trimmed. A partial tail
    /// stays buffered.
    pub fn extract_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            lines.push(self.buffer[..pos].trim().to_string());
            self.buffer.drain(..=pos);
        }
        lines
    }

    /// Drain every complete blank-line-delimited event block.
    pub fn extract_event_blocks(&mut self) -> Vec<String> {
        let mut blocks = Vec::new();
        loop {
            // Some gateways terminate events with CRLF pairs.
            let normalized = self.buffer.replace("\r\n", "\n");
            if normalized.len() != self.buffer.len() {
                self.buffer = normalized;
            }
            let Some(pos) = self.buffer.find("\n\n") else {
                break;
            };
            blocks.push(self.buffer[..pos].to_string());
            self.buffer.drain(..pos + 2);
        }
        blocks
    }

    pub fn residue(&self) -> &str {
        &self.buffer
    }
}

/// Collect the `data:` payload of an SSE block (multiple data lines joined by `\n`).
pub(crate) fn block_data(block: &str) -> Option<String> {
    let parts: Vec<&str> = block
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// The `event:` name of an SSE block, if any.
pub(crate) fn block_event(block: &str) -> Option<&str> {
    block
        .lines()
        .find_map(|l| l.strip_prefix("event:"))
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_lines_partial() {
        let mut buf = SseBuffer::new();
        buf.push_bytes(&bytes::Bytes::from("data: one\ndata: tw"));
        assert_eq!(buf.extract_lines(), vec!["data: one"]);
        assert_eq!(buf.residue(), "data: tw");

        buf.push_bytes(&bytes::Bytes::from("o\n"));
        assert_eq!(buf.extract_lines(), vec!["data: two"]);
        assert!(buf.residue().is_empty());
    }

    #[test]
    fn test_extract_event_blocks_crlf() {
        let mut buf = SseBuffer::new();
        buf.push_bytes(&bytes::Bytes::from(
            "event: a\r\ndata: {\"x\":1}\r\n\r\nevent: b\r\ndata: {}\r\n\r\nevent: c",
        ));
        let blocks = buf.extract_event_blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(block_event(&blocks[0]), Some("a"));
        assert_eq!(block_data(&blocks[0]).as_deref(), Some("{\"x\":1}"));
        assert_eq!(buf.residue(), "event: c");
    }

    #[test]
    fn test_block_without_data() {
        assert_eq!(block_data("event: ping"), None);
        assert_eq!(block_event("data: x"), None);
    }
}
