//! Fragment buffer that stitches flushed trace fragments into one JSON document.
//!
//! A capture backend flushes its events as a series of comma-joined fragments. The
//! [`TraceResultBuffer`] wraps them in `[` ... `]` with separators between fragments
//! and pushes the result into an output callback. [`JsonOutput`] is the pull-based
//! sink the agents use: it collects everything the buffer writes and hands back the
//! finished document with [`JsonOutput::take`].
//!
//! # Examples
//!
//! ```
//! use tracelink::trace_buffer::{JsonOutput, TraceResultBuffer};
//!
//! let output = JsonOutput::new();
//! let mut buffer = TraceResultBuffer::new();
//! buffer.set_output_callback(output.callback());
//!
//! buffer.start();
//! buffer.add_fragment(r#"{"name":"a"}"#);
//! buffer.add_fragment(r#"{"name":"b"}"#);
//! buffer.finish();
//!
//! assert_eq!(output.take(), r#"[{"name":"a"},{"name":"b"}]"#);
//! ```

use std::sync::{Arc, Mutex};

/// Sink receiving the buffer's output text
pub type OutputCallback = Box<dyn FnMut(&str) + Send>;

/// Joins flushed fragments into a JSON array document
#[derive(Default)]
pub struct TraceResultBuffer {
    output: Option<OutputCallback>,
    append_comma: bool,
}

impl TraceResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the output sink
    pub fn set_output_callback(&mut self, output: OutputCallback) {
        self.output = Some(output);
    }

    /// Open the array
    pub fn start(&mut self) {
        self.append_comma = false;
        self.write("[");
    }

    /// Append one fragment, separating it from the previous one.
    ///
    /// Empty fragments are skipped so they never produce a dangling comma.
    pub fn add_fragment(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        if self.append_comma {
            self.write(",");
        }
        self.append_comma = true;
        self.write(fragment);
    }

    /// Close the array
    pub fn finish(&mut self) {
        self.write("]");
    }

    fn write(&mut self, text: &str) {
        if let Some(output) = self.output.as_mut() {
            output(text);
        }
    }
}

/// Shared string sink for a [`TraceResultBuffer`]
#[derive(Debug, Clone, Default)]
pub struct JsonOutput {
    json_output: Arc<Mutex<String>>,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output callback appending to this sink
    pub fn callback(&self) -> OutputCallback {
        let json_output = self.json_output.clone();
        Box::new(move |text: &str| json_output.lock().unwrap().push_str(text))
    }

    /// Take the collected document, leaving the sink empty
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.json_output.lock().unwrap())
    }

    pub fn clear(&self) {
        self.json_output.lock().unwrap().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.json_output.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with_output() -> (TraceResultBuffer, JsonOutput) {
        let output = JsonOutput::new();
        let mut buffer = TraceResultBuffer::new();
        buffer.set_output_callback(output.callback());
        (buffer, output)
    }

    #[test]
    fn test_no_fragments_yields_empty_array() {
        let (mut buffer, output) = buffer_with_output();
        buffer.start();
        buffer.finish();

        assert_eq!(output.take(), "[]");
    }

    #[test]
    fn test_fragments_are_comma_separated() {
        let (mut buffer, output) = buffer_with_output();
        buffer.start();
        buffer.add_fragment("1,2");
        buffer.add_fragment("3");
        buffer.finish();

        assert_eq!(output.take(), "[1,2,3]");
    }

    #[test]
    fn test_empty_fragment_is_skipped() {
        let (mut buffer, output) = buffer_with_output();
        buffer.start();
        buffer.add_fragment("");
        buffer.add_fragment("1");
        buffer.add_fragment("");
        buffer.finish();

        assert_eq!(output.take(), "[1]");
    }

    #[test]
    fn test_restart_resets_separator() {
        let (mut buffer, output) = buffer_with_output();
        buffer.start();
        buffer.add_fragment("1");
        buffer.finish();
        assert_eq!(output.take(), "[1]");

        buffer.start();
        buffer.add_fragment("2");
        buffer.finish();
        assert_eq!(output.take(), "[2]");
    }

    #[test]
    fn test_take_empties_sink() {
        let output = JsonOutput::new();
        let mut callback = output.callback();
        callback("abc");

        assert!(!output.is_empty());
        assert_eq!(output.take(), "abc");
        assert!(output.is_empty());
    }

    #[test]
    fn test_buffer_without_output_is_silent() {
        let mut buffer = TraceResultBuffer::new();
        buffer.start();
        buffer.add_fragment("1");
        buffer.finish();
    }

    #[test]
    fn test_output_parses_as_json() {
        let (mut buffer, output) = buffer_with_output();
        buffer.start();
        buffer.add_fragment(r#"{"name":"a","ph":"i"}"#);
        buffer.finish();

        let value: serde_json::Value = serde_json::from_str(&output.take()).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
    }
}
