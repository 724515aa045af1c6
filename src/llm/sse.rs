/// Reassembles server-sent-event blocks from arbitrarily split byte chunks.
///
/// Event blocks are separated by a blank line. Chunk boundaries can land
/// anywhere, including inside a UTF-8 sequence, so raw bytes are buffered and
/// only complete blocks are decoded.
pub struct SseBuffer {
    buffer: Vec<u8>,
}

const DONE_SENTINEL: &str = "[DONE]";

impl SseBuffer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete event block (everything up to a blank line),
    /// or `None` if no full block has arrived yet.
    pub fn next_event_block(&mut self) -> Option<String> {
        let boundary = find_block_boundary(&self.buffer)?;
        let block: Vec<u8> = self.buffer.drain(..boundary.end).collect();
        let text = String::from_utf8_lossy(&block[..boundary.start]).into_owned();
        Some(text)
    }

    /// Drains whatever is left once the byte stream has ended. Some backends
    /// omit the trailing blank line after the final event.
    pub fn take_remaining(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest).into_owned();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl Default for SseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

struct BlockBoundary {
    /// End of the block's content.
    start: usize,
    /// End of the separator, where the next block begins.
    end: usize,
}

fn find_block_boundary(buffer: &[u8]) -> Option<BlockBoundary> {
    // Accept both \n\n and \r\n\r\n separators.
    let mut i = 0;
    while i + 1 < buffer.len() {
        if buffer[i] == b'\n' && buffer[i + 1] == b'\n' {
            return Some(BlockBoundary {
                start: i,
                end: i + 2,
            });
        }
        if i + 3 < buffer.len() && &buffer[i..i + 4] == b"\r\n\r\n" {
            return Some(BlockBoundary {
                start: i,
                end: i + 4,
            });
        }
        i += 1;
    }
    None
}

/// Extracts the payloads of `data:` lines from an event block, keeping the
/// `[DONE]` sentinel so callers can terminate on it.
pub fn parse_data_lines(block: &str) -> Vec<&str> {
    block
        .lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            line.strip_prefix("data:").map(str::trim_start)
        })
        .filter(|data| !data.is_empty())
        .collect()
}

pub fn is_done_sentinel(data: &str) -> bool {
    data.trim() == DONE_SENTINEL
}
