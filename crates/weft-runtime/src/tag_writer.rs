#![forbid(unsafe_code)]

//! Minimal markup writer used by control views.
//!
//! Start tags are closed lazily: attributes may be written until the next
//! content call. The writer tracks the open element stack so that a failed
//! render can unwind back to the depth it started at.

/// Sink for rendered markup.
pub trait TagWriter {
    /// Open an element. Attributes may follow.
    fn begin_tag(&mut self, name: &str);

    /// Add an attribute to the element opened last. Ignored once content has
    /// been written into it.
    fn write_attribute(&mut self, name: &str, value: &str);

    /// Write escaped text.
    fn text(&mut self, text: &str);

    /// Write markup verbatim.
    fn raw(&mut self, markup: &str);

    /// Close the innermost open element. Returns its name.
    fn end_tag(&mut self) -> Option<String>;

    /// Number of open elements.
    fn depth(&self) -> usize;

    /// Close open elements until `depth` remain.
    fn end_all(&mut self, depth: usize) {
        while self.depth() > depth {
            if self.end_tag().is_none() {
                break;
            }
        }
    }
}

/// [`TagWriter`] rendering HTML into a `String`.
#[derive(Debug, Default)]
pub struct HtmlWriter {
    buf: String,
    open: Vec<String>,
    in_start_tag: bool,
}

impl HtmlWriter {
    /// Empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Markup written so far. Unclosed elements stay unclosed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Finish: close every open element and return the markup.
    #[must_use]
    pub fn into_string(mut self) -> String {
        self.end_all(0);
        self.close_start_tag();
        self.buf
    }

    fn close_start_tag(&mut self) {
        if self.in_start_tag {
            self.buf.push('>');
            self.in_start_tag = false;
        }
    }
}

fn escape_into(buf: &mut String, text: &str, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' if attribute => buf.push_str("&quot;"),
            _ => buf.push(ch),
        }
    }
}

impl TagWriter for HtmlWriter {
    fn begin_tag(&mut self, name: &str) {
        self.close_start_tag();
        self.buf.push('<');
        self.buf.push_str(name);
        self.open.push(name.to_string());
        self.in_start_tag = true;
    }

    fn write_attribute(&mut self, name: &str, value: &str) {
        if !self.in_start_tag {
            return;
        }
        self.buf.push(' ');
        self.buf.push_str(name);
        self.buf.push_str("=\"");
        escape_into(&mut self.buf, value, true);
        self.buf.push('"');
    }

    fn text(&mut self, text: &str) {
        self.close_start_tag();
        escape_into(&mut self.buf, text, false);
    }

    fn raw(&mut self, markup: &str) {
        self.close_start_tag();
        self.buf.push_str(markup);
    }

    fn end_tag(&mut self) -> Option<String> {
        let name = self.open.pop()?;
        self.close_start_tag();
        self.buf.push_str("</");
        self.buf.push_str(&name);
        self.buf.push('>');
        Some(name)
    }

    fn depth(&self) -> usize {
        self.open.len()
    }
}
