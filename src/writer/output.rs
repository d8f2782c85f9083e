//! Brace-driven indentation for emitted text.
//!
//! Callers append unindented lines; the stream tracks nesting from the braces
//! it sees. A line ending in `{` opens a level, a line starting with `}` closes
//! one before it is written.

#[derive(Debug, Clone)]
pub struct IndentedOutput {
    buf: String,
    level: usize,
    unit: String,
}

impl IndentedOutput {
    pub fn new(indent_width: usize) -> Self {
        Self {
            buf: String::new(),
            level: 0,
            unit: " ".repeat(indent_width),
        }
    }

    /// Append one or more lines at the current nesting level.
    pub fn append(&mut self, text: &str) {
        for line in text.lines() {
            self.push_line(line.trim(), 0);
        }
    }

    /// Append lines one level deeper than the current nesting, for a
    /// single unbraced statement under `if`/`else`.
    pub fn append_nested(&mut self, text: &str) {
        for line in text.lines() {
            self.push_line(line.trim(), 1);
        }
    }

    fn push_line(&mut self, line: &str, extra: usize) {
        if line.is_empty() {
            self.buf.push('\n');
            return;
        }
        if line.starts_with('}') {
            self.level = self.level.saturating_sub(1);
        }
        for _ in 0..self.level + extra {
            self.buf.push_str(&self.unit);
        }
        self.buf.push_str(line);
        self.buf.push('\n');
        if line.ends_with('{') {
            self.level += 1;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
