//! Allow-list filter for raw HTML embedded in message text.
//!
//! Model output may contain markup. Nothing is ever executed in a terminal,
//! but scriptable elements still must not leak their bodies into the
//! transcript, and control characters must not reach the terminal as escape
//! sequences.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Elements removed together with everything inside them, provided the
/// message closes them. An unclosed one is stripped like any unknown tag.
const DROP_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "noscript", "template", "svg", "math", "textarea",
    "select", "title", "head",
];

/// Elements that become a line break.
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "li", "tr", "ul", "ol", "table", "blockquote", "pre", "hr", "h1", "h2",
    "h3", "h4", "h5", "h6", "section", "article", "header", "footer",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlFormat {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Mark,
}

/// What survives sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeHtml {
    Text(String),
    Open(HtmlFormat),
    Close(HtmlFormat),
    LineBreak,
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<[!?][^>]*>|<(/?)([A-Za-z][A-Za-z0-9-]*)(?:\s[^>]*?)?\s*(/?)>")
            .expect("tag pattern is valid")
    })
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);").expect("entity pattern is valid")
    })
}

fn format_for(name: &str) -> Option<HtmlFormat> {
    match name {
        "b" | "strong" => Some(HtmlFormat::Bold),
        "i" | "em" | "cite" => Some(HtmlFormat::Italic),
        "u" | "ins" => Some(HtmlFormat::Underline),
        "s" | "del" | "strike" => Some(HtmlFormat::Strike),
        "code" | "kbd" | "samp" | "tt" => Some(HtmlFormat::Code),
        "mark" => Some(HtmlFormat::Mark),
        _ => None,
    }
}

/// Stateful across fragments: markdown hands raw HTML over one tag or one
/// line at a time, so `<script>` and `</script>` can arrive separately.
#[derive(Debug, Default)]
pub struct HtmlSanitizer {
    dropped: Vec<String>,
    /// Closing tags of drop-with-content elements not yet reached, by name.
    closers_ahead: HashMap<String, usize>,
}

impl HtmlSanitizer {
    /// Sanitizer for one message. The whole text is scanned up front so an
    /// opening `<title>` only swallows content when its `</title>` follows.
    pub fn for_document(text: &str) -> Self {
        let mut closers_ahead = HashMap::new();
        for caps in tag_regex().captures_iter(text) {
            let Some(name) = caps.get(2) else { continue };
            let name = name.as_str().to_ascii_lowercase();
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            if closing && DROP_WITH_CONTENT.contains(&name.as_str()) {
                *closers_ahead.entry(name).or_insert(0) += 1;
            }
        }
        Self {
            dropped: Vec::new(),
            closers_ahead,
        }
    }

    /// True while inside a dropped element; the caller must discard any
    /// markdown text it sees in the meantime.
    pub fn is_suppressing(&self) -> bool {
        !self.dropped.is_empty()
    }

    pub fn feed(&mut self, raw: &str) -> Vec<SafeHtml> {
        let mut out = Vec::new();
        let mut last = 0;

        for caps in tag_regex().captures_iter(raw) {
            let Some(whole) = caps.get(0) else { continue };
            self.emit_text(&raw[last..whole.start()], &mut out);
            last = whole.end();

            // Comments, doctypes and processing instructions have no name.
            let Some(name) = caps.get(2) else { continue };
            let name = name.as_str().to_ascii_lowercase();
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
            self.tag(&name, closing, self_closing, &mut out);
        }
        self.emit_text(&raw[last..], &mut out);

        out
    }

    fn tag(&mut self, name: &str, closing: bool, self_closing: bool, out: &mut Vec<SafeHtml>) {
        if DROP_WITH_CONTENT.contains(&name) {
            if closing {
                match self.dropped.iter().rposition(|n| n == name) {
                    Some(pos) => self.dropped.truncate(pos),
                    // Stray closer; it cannot close anything opened later.
                    None => {
                        self.take_closer(name);
                    }
                }
            } else if !self_closing && self.take_closer(name) {
                self.dropped.push(name.to_string());
            }
            return;
        }
        if self.is_suppressing() {
            return;
        }

        if BLOCK_TAGS.contains(&name) {
            out.push(SafeHtml::LineBreak);
        } else if let Some(format) = format_for(name) {
            if closing {
                out.push(SafeHtml::Close(format));
            } else if !self_closing {
                out.push(SafeHtml::Open(format));
            }
        }
    }

    /// Reserve one of the closing tags still ahead for `name`.
    fn take_closer(&mut self, name: &str) -> bool {
        match self.closers_ahead.get_mut(name) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn emit_text(&self, text: &str, out: &mut Vec<SafeHtml>) {
        if self.is_suppressing() || text.is_empty() {
            return;
        }
        let mut segments = text.split('\n').peekable();
        while let Some(segment) = segments.next() {
            if !segment.is_empty() {
                out.push(SafeHtml::Text(decode_entities(segment).into_owned()));
            }
            if segments.peek().is_some() {
                out.push(SafeHtml::LineBreak);
            }
        }
    }
}

/// Decode the handful of entities that show up in chat output. Unknown
/// names are left as written.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    entity_regex().replace_all(text, |caps: &Captures| {
        let body = &caps[1];
        let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
            u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
        } else if let Some(dec) = body.strip_prefix('#') {
            dec.parse::<u32>().ok().and_then(char::from_u32)
        } else {
            match body {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => None,
            }
        };
        match decoded {
            Some(c) if !c.is_control() => c.to_string(),
            Some(_) => String::new(),
            None => caps[0].to_string(),
        }
    })
}

/// Remove control characters (ESC in particular) so message text cannot
/// drive the terminal. Tabs become spaces; newlines are kept.
pub fn strip_controls(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| c.is_control() && c != '\n') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => out.push('\n'),
            '\t' => out.push_str("    "),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}
