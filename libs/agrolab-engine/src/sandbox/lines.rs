// Reassembles newline-delimited frames from arbitrarily chunked output

/// Longest response line a worker may send before it is considered broken
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes (without the newline)
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                let raw = std::mem::take(&mut self.pending);
                lines.push(String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string());
            } else {
                self.pending.push(byte);
                if self.pending.len() > MAX_LINE_BYTES {
                    return Err(format!("worker line exceeded {} bytes", MAX_LINE_BYTES));
                }
            }
        }
        Ok(lines)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
