//! SSE (Server-Sent Events) framing.
//!
//! This module provides the wire codec shared by both sides of the gateway:
//! the parser decodes event streams arriving from upstream providers, and the
//! format helpers produce the frames the gateway sends to its own clients.

/// Marker payload that terminates an OpenAI-style event stream.
pub const DONE_MARKER: &str = "[DONE]";

/// SSE event parsed from stream.
#[derive(Debug, Clone, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: Option<String>,
    pub id: Option<String>,
    pub retry: Option<u64>,
}

impl SseEvent {
    /// Whether this event carries the stream-terminating `[DONE]` marker.
    pub fn is_done(&self) -> bool {
        self.data.as_deref() == Some(DONE_MARKER)
    }
}

/// SSE parser state.
pub struct SseParser {
    buffer: String,
}

impl SseParser {
    /// Create a new SSE parser.
    pub fn new() -> Self {
        SseParser {
            buffer: String::new(),
        }
    }

    /// Parse incoming bytes and return complete events.
    pub fn parse(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let chunk_str = match std::str::from_utf8(chunk) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        self.buffer.push_str(chunk_str);

        let mut events = vec![];
        let mut current_event = SseEvent::default();

        // Split by double newlines (event boundaries)
        while let Some(pos) = self.buffer.find("\n\n") {
            let event_block = self.buffer[..pos].to_string();
            self.buffer = self.buffer[pos + 2..].to_string();

            for line in event_block.lines() {
                if line.is_empty() {
                    continue;
                }

                if line.starts_with(':') {
                    // Comment, ignore
                    continue;
                }

                if let Some((field, value)) = line.split_once(':') {
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    match field {
                        "event" => current_event.event = Some(value.to_string()),
                        "data" => {
                            if let Some(ref mut data) = current_event.data {
                                data.push('\n');
                                data.push_str(value);
                            } else {
                                current_event.data = Some(value.to_string());
                            }
                        }
                        "id" => current_event.id = Some(value.to_string()),
                        "retry" => current_event.retry = value.parse().ok(),
                        _ => {}
                    }
                }
            }

            if current_event.data.is_some() || current_event.event.is_some() {
                events.push(current_event);
                current_event = SseEvent::default();
            }
        }

        events
    }

    /// Get remaining buffer content.
    pub fn remaining(&self) -> &str {
        &self.buffer
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a data-only SSE frame for transmission.
pub fn format_sse_data(data: &str) -> String {
    format!("data: {}\n\n", data)
}

/// Format the SSE done marker that ends every streamed completion.
pub fn format_sse_done() -> String {
    format!("data: {}\n\n", DONE_MARKER)
}
