use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use taskpilot_core::ChatRole;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, InputMode};

const TITLE: &str = " Assistant – Task & Goal Management ";
const PLACEHOLDER: &str = "Ask about your goals or tasks...";
const JUMP_LABEL: &str = " ↓ Scroll to bottom ";

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, conversation, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(TITLE, Style::default().fg(Color::Cyan).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn role_label(role: ChatRole) -> Line<'static> {
    match role {
        ChatRole::User => Line::from(Span::styled(
            "You:",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        ChatRole::Assistant | ChatRole::System => Line::from(Span::styled(
            "Assistant:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
    }
}

fn chat_lines(app: &mut App) -> Vec<Line<'static>> {
    let busy = app.is_busy();
    let frame = app.animation_frame;

    let mut lines: Vec<Line<'static>> = Vec::new();
    for message in app.transcript() {
        lines.push(role_label(message.role));
        lines.extend(message.lines.iter().cloned());
        lines.push(Line::default());
    }

    if busy {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat(usize::from(frame) + 1);
        lines.push(Line::from(Span::styled(
            format!("Assistant is typing{dots}"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No messages yet. Tell me what you are working toward this week.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");
    let inner = block.inner(area);

    // Store area for mouse hit-testing
    app.chat_area = Some(inner);

    let paragraph = Paragraph::new(chat_lines(app)).wrap(Wrap { trim: false });

    // Measured without the block so the count is content lines only
    let content_height = u16::try_from(paragraph.line_count(inner.width)).unwrap_or(u16::MAX);
    app.view.set_geometry(inner.height, content_height);

    let paragraph = paragraph.block(block).scroll((app.view.offset(), 0));
    frame.render_widget(paragraph, area);

    app.jump_area = if app.view.show_jump_control() {
        render_jump_control(frame, inner)
    } else {
        None
    };
}

/// Overlay the "scroll to bottom" control on the bottom-right corner of the
/// list. Returns where it was drawn.
fn render_jump_control(frame: &mut Frame, inner: Rect) -> Option<Rect> {
    let width = JUMP_LABEL.width() as u16;
    if inner.height == 0 || inner.width < width {
        return None;
    }

    let button = Rect::new(
        inner.x + inner.width - width,
        inner.y + inner.height - 1,
        width,
        1,
    );
    frame.render_widget(Clear, button);
    frame.render_widget(
        Paragraph::new(JUMP_LABEL)
            .style(Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)),
        button,
    );
    Some(button)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.is_busy() { " Message (waiting for reply) " } else { " Message " };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    if app.input.is_empty() {
        let placeholder = Paragraph::new(PLACEHOLDER)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        if editing {
            frame.set_cursor_position((area.x + 1, area.y + 1));
        }
        return;
    }

    // Calculate visible portion of input with horizontal scrolling
    // Inner width = total width - 2 (for borders)
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) = input_window(&app.input, app.cursor, inner_width);

    // Use cyan text to match the "You:" style
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    // Show cursor when editing
    if editing {
        frame.set_cursor_position((area.x + cursor_x as u16 + 1, area.y + 1));
    }
}

/// The part of `input` that fits in `width` cells with the cursor in view,
/// and the cursor's column within it. Measured in display cells, so wide
/// glyphs count double.
fn input_window(input: &str, cursor: usize, width: usize) -> (String, usize) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());
    let cells = |c: char| c.width().unwrap_or(0);

    // Walk left from the cursor, leaving one cell for the cursor itself
    let budget = width.saturating_sub(1);
    let mut start = cursor;
    let mut cursor_x = 0;
    while start > 0 {
        let w = cells(chars[start - 1]);
        if cursor_x + w > budget {
            break;
        }
        cursor_x += w;
        start -= 1;
    }

    let mut used = 0;
    let visible = chars[start..]
        .iter()
        .copied()
        .take_while(|&c| {
            used += cells(c);
            used <= width
        })
        .collect();
    (visible, cursor_x)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" EDIT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.input_mode {
        InputMode::Normal => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" page ", label_style),
            Span::styled(" G ", key_style),
            Span::styled(" bottom ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        InputMode::Editing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop typing ", label_style),
            Span::styled(" Ctrl+C ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    spans.extend(hints);

    if let Some(error) = app.controller.last_error() {
        spans.push(Span::styled(" ", label_style));
        spans.push(Span::styled(
            format!(" {error} "),
            Style::default().bg(Color::Red).fg(Color::White),
        ));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
