//! Message text to styled terminal lines.
//!
//! Pure and deterministic: the same text always yields the same lines, and
//! nothing here touches the network or any shared state besides the
//! lazily-loaded highlighting assets.

mod highlight;
mod sanitize;

use highlight::highlight_code;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;
use std::sync::OnceLock;
use unicode_width::UnicodeWidthStr;

use sanitize::{strip_controls, HtmlFormat, HtmlSanitizer, SafeHtml};

const RULE_WIDTH: usize = 24;

fn autolink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:https?://|www\.)[^\s<>]*[^\s<>.,;:!?'")\]]"#)
            .expect("autolink pattern is valid")
    })
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::UNDERLINED)
}

fn dim_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn inline_code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn heading_style(level: usize) -> Style {
    let style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    if level == 1 {
        style.add_modifier(Modifier::UNDERLINED)
    } else {
        style
    }
}

fn html_style(format: HtmlFormat) -> Style {
    match format {
        HtmlFormat::Bold => Style::default().add_modifier(Modifier::BOLD),
        HtmlFormat::Italic => Style::default().add_modifier(Modifier::ITALIC),
        HtmlFormat::Underline => Style::default().add_modifier(Modifier::UNDERLINED),
        HtmlFormat::Strike => Style::default().add_modifier(Modifier::CROSSED_OUT),
        HtmlFormat::Code => inline_code_style(),
        HtmlFormat::Mark => Style::default().fg(Color::Black).bg(Color::Yellow),
    }
}

fn is_displayable_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
}

/// Render one message's raw text (markdown, possibly with embedded HTML).
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let text = strip_controls(text);
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;

    let mut renderer = Renderer {
        html: HtmlSanitizer::for_document(&text),
        ..Renderer::default()
    };
    for event in Parser::new_ext(&text, options) {
        renderer.event(event);
    }
    renderer.finish()
}

struct CodeBlock {
    lang: Option<String>,
    buf: String,
}

struct LinkState {
    url: String,
    text: String,
}

#[derive(Default)]
struct TableBuf {
    rows: Vec<Vec<Vec<Span<'static>>>>,
    header_rows: usize,
    row: Vec<Vec<Span<'static>>>,
    cell: Vec<Span<'static>>,
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    html_formats: Vec<HtmlFormat>,
    html: HtmlSanitizer,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    code: Option<CodeBlock>,
    table: Option<TableBuf>,
    link: Option<LinkState>,
}

impl Renderer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if !self.html.is_suppressing() {
                    let style = self.current_style().patch(inline_code_style());
                    self.push_span(Span::styled(strip_controls(&code).into_owned(), style));
                }
            }
            Event::Html(raw) | Event::InlineHtml(raw) => self.html(&raw),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.start_block();
                self.push_line(Line::from(Span::styled("─".repeat(RULE_WIDTH), dim_style())));
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_span(Span::styled(marker, Style::default().fg(Color::Green)));
            }
            Event::FootnoteReference(label) => {
                let label = strip_controls(&label).into_owned();
                self.push_span(Span::styled(format!("[{label}]"), dim_style()));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.start_block();
                }
            }
            Tag::Heading { level, .. } => {
                self.start_block();
                self.styles.push(heading_style(level as usize));
            }
            Tag::BlockQuote => {
                self.start_block();
                self.quote_depth += 1;
                self.styles.push(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.start_block();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeBlock {
                    lang,
                    buf: String::new(),
                });
            }
            Tag::HtmlBlock => self.start_block(),
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.start_block();
                } else {
                    self.flush_line();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.lists.len().saturating_sub(1);
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let bullet = format!("{n}. ");
                        *n += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.spans.push(Span::raw("  ".repeat(depth)));
                self.spans.push(Span::styled(bullet, Style::default().fg(Color::Cyan)));
            }
            Tag::Table(_) => {
                self.start_block();
                self.table = Some(TableBuf::default());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                }
            }
            Tag::Emphasis => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self
                .styles
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { dest_url, .. } => {
                self.styles.push(link_style());
                self.link = Some(LinkState {
                    url: dest_url.to_string(),
                    text: String::new(),
                });
            }
            Tag::Image { .. } => {
                self.push_span(Span::styled("[image: ", dim_style()));
                self.styles.push(dim_style());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush_line(),
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.flush_line();
            }
            TagEnd::BlockQuote => {
                self.flush_line();
                self.styles.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    for line in highlight_code(&code.buf, code.lang.as_deref()) {
                        self.push_line(line);
                    }
                }
            }
            TagEnd::HtmlBlock => self.flush_line(),
            TagEnd::List(_) => {
                self.flush_line();
                self.lists.pop();
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell);
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                    table.header_rows += 1;
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    for line in render_table(table) {
                        self.push_line(line);
                    }
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(link) = self.link.take() {
                    let url = strip_controls(&link.url);
                    let shown = url.trim_start_matches("mailto:");
                    if is_displayable_url(&url) && shown != link.text {
                        self.push_span(Span::styled(format!(" ({url})"), dim_style()));
                    }
                }
            }
            TagEnd::Image => {
                self.styles.pop();
                self.push_span(Span::styled("]", dim_style()));
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.html.is_suppressing() {
            return;
        }
        // The parser decodes character references, so `&#27;` arrives here
        // as a real ESC even though the raw input was already clean.
        let text = strip_controls(text);
        let text = text.as_ref();
        if let Some(code) = self.code.as_mut() {
            code.buf.push_str(text);
            return;
        }

        let style = self.current_style();
        if let Some(link) = self.link.as_mut() {
            link.text.push_str(text);
            self.push_span(Span::styled(text.to_string(), style));
            return;
        }

        let mut last = 0;
        for m in autolink_regex().find_iter(text) {
            if m.start() > last {
                self.push_span(Span::styled(text[last..m.start()].to_string(), style));
            }
            self.push_span(Span::styled(m.as_str().to_string(), style.patch(link_style())));
            last = m.end();
        }
        if last < text.len() {
            self.push_span(Span::styled(text[last..].to_string(), style));
        }
    }

    fn html(&mut self, raw: &str) {
        for token in self.html.feed(raw) {
            match token {
                SafeHtml::Text(text) => self.text(&text),
                SafeHtml::Open(format) => self.html_formats.push(format),
                SafeHtml::Close(format) => {
                    if let Some(pos) = self.html_formats.iter().rposition(|f| *f == format) {
                        self.html_formats.remove(pos);
                    }
                }
                SafeHtml::LineBreak => self.flush_line(),
            }
        }
    }

    fn current_style(&self) -> Style {
        let base = self
            .styles
            .iter()
            .fold(Style::default(), |acc, style| acc.patch(*style));
        self.html_formats
            .iter()
            .fold(base, |acc, format| acc.patch(html_style(*format)))
    }

    fn push_span(&mut self, span: Span<'static>) {
        match self.table.as_mut() {
            Some(table) => table.cell.push(span),
            None => self.spans.push(span),
        }
    }

    fn push_line(&mut self, line: Line<'static>) {
        if self.quote_depth == 0 {
            self.lines.push(line);
            return;
        }
        let mut spans = vec![Span::styled("│ ".repeat(self.quote_depth), dim_style())];
        spans.extend(line.spans);
        self.lines.push(Line::from(spans));
    }

    fn flush_line(&mut self) {
        if self.table.is_some() || self.spans.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        self.push_line(Line::from(spans));
    }

    /// Separate top-level blocks with one blank line.
    fn start_block(&mut self) {
        self.flush_line();
        if !self.lists.is_empty() {
            return;
        }
        let last_blank = self
            .lines
            .last()
            .map_or(true, |line| line.spans.iter().all(|s| s.content.trim().is_empty()));
        if !last_blank {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        self.lines
    }
}

fn cell_width(cell: &[Span<'_>]) -> usize {
    cell.iter().map(|span| span.content.width()).sum()
}

fn render_table(table: TableBuf) -> Vec<Line<'static>> {
    let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell_width(cell));
        }
    }

    let separator = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();
    for (row_idx, row) in table.rows.into_iter().enumerate() {
        let header = row_idx < table.header_rows;
        let mut spans = Vec::new();
        let mut cells = row.into_iter();
        for (col, width) in widths.iter().enumerate() {
            if col > 0 {
                spans.push(Span::styled(" │ ", separator));
            }
            let cell = cells.next().unwrap_or_default();
            let used = cell_width(&cell);
            for span in cell {
                if header {
                    let style = span.style.add_modifier(Modifier::BOLD);
                    spans.push(span.style(style));
                } else {
                    spans.push(span);
                }
            }
            if *width > used {
                spans.push(Span::raw(" ".repeat(width - used)));
            }
        }
        lines.push(Line::from(spans));

        if header && row_idx + 1 == table.header_rows {
            let rule = widths
                .iter()
                .map(|w| "─".repeat(*w))
                .collect::<Vec<_>>()
                .join("─┼─");
            lines.push(Line::from(Span::styled(rule, separator)));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect()
    }

    fn find_span<'a>(lines: &'a [Line<'static>], needle: &str) -> &'a Span<'static> {
        lines
            .iter()
            .flat_map(|l| l.spans.iter())
            .find(|s| s.content.contains(needle))
            .unwrap_or_else(|| panic!("no span containing {needle:?}"))
    }

    #[test]
    fn test_paragraphs_and_emphasis() {
        let lines = render_markdown("Hello **world** and *you*.\n\nSecond ~~old~~ para");
        assert_eq!(plain(&lines), vec!["Hello world and you.", "", "Second old para"]);
        assert!(find_span(&lines, "world").style.add_modifier.contains(Modifier::BOLD));
        assert!(find_span(&lines, "you").style.add_modifier.contains(Modifier::ITALIC));
        assert!(find_span(&lines, "old").style.add_modifier.contains(Modifier::CROSSED_OUT));
    }

    #[test]
    fn test_soft_break_is_space() {
        let lines = render_markdown("one\ntwo");
        assert_eq!(plain(&lines), vec!["one two"]);
    }

    #[test]
    fn test_lists() {
        let lines = render_markdown("- a\n- b\n  1. x\n  2. y\n- [x] done");
        assert_eq!(
            plain(&lines),
            vec!["• a", "• b", "  1. x", "  2. y", "• [x] done"]
        );
    }

    #[test]
    fn test_table() {
        let lines = render_markdown("| Goal | Due |\n|---|---|\n| Ship | Friday |\n");
        assert_eq!(
            plain(&lines),
            vec!["Goal │ Due   ", "─────┼───────", "Ship │ Friday"]
        );
        assert!(find_span(&lines, "Goal").style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_fenced_code_highlighted() {
        let lines = render_markdown("Look:\n\n```rust\nlet x = 1;\n```\n");
        assert_eq!(plain(&lines), vec!["Look:", "", "let x = 1;"]);
        assert!(lines[2]
            .spans
            .iter()
            .all(|s| matches!(s.style.fg, Some(Color::Rgb(..)))));
    }

    #[test]
    fn test_inline_script_removed() {
        let lines = render_markdown("Hi <script>alert('x')</script>there <b>bold</b>");
        assert_eq!(plain(&lines), vec!["Hi there bold"]);
        assert!(find_span(&lines, "bold").style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_unclosed_title_keeps_rest_of_reply() {
        let lines =
            render_markdown("Put the name in a <title> element.\n\nThen add your goals table below.");
        assert_eq!(
            plain(&lines),
            vec!["Put the name in a  element.", "", "Then add your goals table below."]
        );
    }

    #[test]
    fn test_unclosed_script_tag_is_stripped_not_hiding() {
        let lines = render_markdown("Avoid a bare <script> tag.\n\n- keep this");
        assert_eq!(plain(&lines), vec!["Avoid a bare  tag.", "", "• keep this"]);
    }

    #[test]
    fn test_block_html_sanitized() {
        let lines = render_markdown("<div>\n<style>p { x: y }</style>\nkept\n</div>\n\nafter");
        let text = plain(&lines).join("\n");
        assert!(text.contains("kept"));
        assert!(text.contains("after"));
        assert!(!text.contains("x: y"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_autolinks_and_links() {
        let lines = render_markdown("See https://example.com/a, or [docs](https://docs.rs).");
        assert_eq!(
            plain(&lines),
            vec!["See https://example.com/a, or docs (https://docs.rs)."]
        );
        let url = find_span(&lines, "https://example.com/a");
        assert_eq!(url.content, "https://example.com/a");
        assert!(url.style.add_modifier.contains(Modifier::UNDERLINED));
    }

    #[test]
    fn test_unsafe_link_target_hidden() {
        let lines = render_markdown("[click](javascript:alert(1))");
        assert_eq!(plain(&lines), vec!["click"]);
    }

    #[test]
    fn test_escape_sequences_stripped() {
        let lines = render_markdown("\u{1b}]0;pwned\u{7}title");
        assert!(plain(&lines).iter().all(|l| !l.contains('\u{1b}')));
    }

    #[test]
    fn test_encoded_controls_stripped() {
        let lines = render_markdown("a&#27;[31mred&#x9b;2J");
        assert_eq!(plain(&lines), vec!["a[31mred2J"]);

        let lines = render_markdown(
            "`b&#27;` <i>&#x1b;x</i> [t](https://x.test/&#27;a)\n\n```\nc&#27;\n```",
        );
        for line in plain(&lines) {
            assert!(!line.chars().any(char::is_control), "{line:?}");
        }
    }

    #[test]
    fn test_encoded_controls_never_reach_the_terminal_buffer() {
        use ratatui::{backend::TestBackend, widgets::Paragraph, Terminal};

        let lines = render_markdown("a&#27;[2Jb");
        let mut terminal = Terminal::new(TestBackend::new(20, 1)).unwrap();
        terminal
            .draw(|frame| frame.render_widget(Paragraph::new(lines), frame.area()))
            .unwrap();
        let buffer = terminal.backend().buffer();
        let row: String = (0..20u16).map(|x| buffer[(x, 0u16)].symbol()).collect();
        assert_eq!(row.trim_end(), "a[2Jb");
    }

    #[test]
    fn test_heading_and_quote() {
        let lines = render_markdown("# Week\n\n> stay focused");
        assert_eq!(plain(&lines), vec!["Week", "", "│ stay focused"]);
        assert!(find_span(&lines, "Week").style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_deterministic() {
        let src = "# T\n\n| a | b |\n|-|-|\n| 1 | 2 |\n\n```py\nprint(1)\n```";
        assert_eq!(render_markdown(src), render_markdown(src));
    }

    #[test]
    fn test_empty_text() {
        assert!(render_markdown("").is_empty());
    }
}
