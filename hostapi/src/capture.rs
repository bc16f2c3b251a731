//! In-memory log sink for testing.
//!
//! `CaptureSink` records every guest log line. Clones share the same buffer,
//! so a test can hand one clone to a session and inspect the other afterwards.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::HostError;
use crate::traits::LogSink;

/// Log sink that keeps every line in a shared buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    lines: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Raw lines in the order the guest logged them.
    pub fn lines(&self) -> Vec<Vec<u8>> {
        self.guard().clone()
    }

    /// Lines decoded as UTF-8, replacing invalid sequences.
    pub fn text_lines(&self) -> Vec<String> {
        self.guard()
            .iter()
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }
}

impl LogSink for CaptureSink {
    fn write(&mut self, message: &[u8]) -> Result<(), HostError> {
        self.guard().push(message.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_records_in_order() {
        let mut sink = CaptureSink::new();
        sink.write(b"first").unwrap();
        sink.write(b"second").unwrap();
        assert_eq!(sink.text_lines(), vec!["first", "second"]);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_clones_share_buffer() {
        let observer = CaptureSink::new();
        let mut writer = observer.clone();
        writer.write(b"example.com").unwrap();
        assert_eq!(observer.lines(), vec![b"example.com".to_vec()]);
    }

    #[test]
    fn test_clear() {
        let mut sink = CaptureSink::new();
        sink.write(b"x").unwrap();
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_lossy_text() {
        let mut sink = CaptureSink::new();
        sink.write(&[b'a', 0xff]).unwrap();
        assert_eq!(sink.text_lines(), vec!["a\u{fffd}"]);
    }
}
