//! Incremental `data:` event framing
//!
//! Events are separated by a blank line. Reads can end anywhere, including
//! inside a multi-byte character, so raw bytes are buffered and only complete
//! events are decoded to text.

use tracing::warn;

/// Largest event held while waiting for its terminating blank line
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Accumulates stream bytes and yields the payload of each completed event
#[derive(Debug)]
pub struct EventFramer {
  buffer: Vec<u8>,
  /// Offset already searched for a terminator without a match
  scanned: usize,
  max_event: usize,
  /// Skipping the rest of an oversized event
  discarding: bool,
}

impl Default for EventFramer {
  fn default() -> Self {
    Self::with_max_event(MAX_EVENT_BYTES)
  }
}

impl EventFramer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_max_event(max_event: usize) -> Self {
    Self { buffer: Vec::new(), scanned: 0, max_event, discarding: false }
  }

  /// Feed one read's worth of bytes, returning every payload it completed
  pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
    self.buffer.extend_from_slice(bytes);

    let mut payloads = Vec::new();
    while let Some((end, delimiter_len)) = find_delimiter(&self.buffer, self.scanned) {
      let chunk: Vec<u8> = self.buffer.drain(..end + delimiter_len).collect();
      self.scanned = 0;
      if self.discarding {
        self.discarding = false;
        continue;
      }
      let text = String::from_utf8_lossy(&chunk[..end]);
      if let Some(payload) = extract_data(&text) {
        payloads.push(payload);
      }
    }
    // A terminator may straddle the next read, so back off by its length - 1.
    self.scanned = self.buffer.len().saturating_sub(3);

    if self.buffer.len() > self.max_event {
      if !self.discarding {
        warn!(limit = self.max_event, "dropping oversized event");
      }
      self.buffer.clear();
      self.scanned = 0;
      self.discarding = true;
    }
    payloads
  }

  /// Bytes held back waiting for a terminating blank line
  pub fn pending(&self) -> usize {
    self.buffer.len()
  }
}

/// Position and length of the first blank-line terminator at or after `from`
fn find_delimiter(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
  let tail = &buffer[from.min(buffer.len())..];
  let lf = tail.windows(2).position(|w| w == b"\n\n").map(|at| (from + at, 2));
  let crlf = tail.windows(4).position(|w| w == b"\r\n\r\n").map(|at| (from + at, 4));

  match (lf, crlf) {
    (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
    (a, b) => a.or(b),
  }
}

/// Join the `data:` lines of one event; other fields and comments are ignored
fn extract_data(event: &str) -> Option<String> {
  let lines: Vec<&str> = event
    .lines()
    .filter_map(|line| line.strip_prefix("data:"))
    .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
    .collect();

  if lines.is_empty() {
    None
  } else {
    Some(lines.join("\n"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const MESSAGE: &str =
    "data: {\"type\":\"message_update\",\"fromName\":\"Alice\",\"content\":\"Hi\"}\n\n";

  #[test]
  fn test_single_event_in_one_read() {
    let mut framer = EventFramer::new();
    let payloads = framer.push(MESSAGE.as_bytes());
    assert_eq!(
      payloads,
      vec![r#"{"type":"message_update","fromName":"Alice","content":"Hi"}"#.to_string()]
    );
    assert_eq!(framer.pending(), 0);
  }

  #[test]
  fn test_every_two_way_split_yields_exactly_one_event() {
    let bytes = MESSAGE.as_bytes();
    for split in 0..=bytes.len() {
      let mut framer = EventFramer::new();
      let mut payloads = framer.push(&bytes[..split]);
      payloads.extend(framer.push(&bytes[split..]));
      assert_eq!(payloads.len(), 1, "split at {split}");
    }
  }

  #[test]
  fn test_byte_at_a_time_delivery() {
    let mut framer = EventFramer::new();
    let mut payloads = Vec::new();
    for byte in MESSAGE.as_bytes() {
      payloads.extend(framer.push(std::slice::from_ref(byte)));
    }
    assert_eq!(payloads.len(), 1);
  }

  #[test]
  fn test_multibyte_character_split_across_reads() {
    let event = "data: {\"content\":\"olá 👋\"}\n\n";
    let bytes = event.as_bytes();
    let wave = event.find('👋').unwrap();

    let mut framer = EventFramer::new();
    assert!(framer.push(&bytes[..wave + 2]).is_empty());
    let payloads = framer.push(&bytes[wave + 2..]);
    assert_eq!(payloads, vec!["{\"content\":\"olá 👋\"}".to_string()]);
  }

  #[test]
  fn test_incomplete_tail_is_retained() {
    let mut framer = EventFramer::new();
    let payloads = framer.push(b"data: {\"a\":1}\n\ndata: {\"b\":");
    assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
    assert_eq!(framer.pending(), "data: {\"b\":".len());

    let payloads = framer.push(b"2}\n\n");
    assert_eq!(payloads, vec!["{\"b\":2}".to_string()]);
  }

  #[test]
  fn test_multi_line_data_is_rejoined() {
    let mut framer = EventFramer::new();
    let payloads = framer.push(b"data: {\ndata:   \"a\": 1\ndata: }\n\n");
    assert_eq!(payloads, vec!["{\n  \"a\": 1\n}".to_string()]);
  }

  #[test]
  fn test_comments_and_other_fields_are_dropped() {
    let mut framer = EventFramer::new();
    let payloads = framer.push(b": keep-alive\n\nevent: update\nid: 7\ndata: {}\n\n");
    assert_eq!(payloads, vec!["{}".to_string()]);
  }

  #[test]
  fn test_crlf_terminated_events() {
    let mut framer = EventFramer::new();
    let payloads = framer.push(b"data: {\"x\":1}\r\n\r\ndata: {\"y\":2}\r\n\r\n");
    assert_eq!(payloads, vec!["{\"x\":1}".to_string(), "{\"y\":2}".to_string()]);
  }

  #[test]
  fn test_terminator_split_between_reads_after_long_tail() {
    let mut framer = EventFramer::new();
    assert!(framer.push(b"data: {\"long\":\"aaaaaaaaaaaaaaaa\"}\r\n").is_empty());
    assert!(framer.push(b"\r").is_empty());
    let payloads = framer.push(b"\ndata: {}");
    assert_eq!(payloads, vec!["{\"long\":\"aaaaaaaaaaaaaaaa\"}".to_string()]);
    assert_eq!(framer.pending(), "data: {}".len());
  }

  #[test]
  fn test_oversized_event_is_dropped_and_stream_recovers() {
    let mut framer = EventFramer::with_max_event(16);
    assert!(framer.push(b"data: {\"blob\":\"0123456789").is_empty());
    assert_eq!(framer.pending(), 0);
    assert!(framer.push(b"0123456789\"}").is_empty());

    let payloads = framer.push(b"\n\ndata: {\"ok\":1}\n\n");
    assert_eq!(payloads, vec!["{\"ok\":1}".to_string()]);
    assert_eq!(framer.pending(), 0);
  }
}
