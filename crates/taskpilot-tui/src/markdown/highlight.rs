use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SyntectStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

const THEME_NAME: &str = "base16-ocean.dark";

struct HighlightAssets {
    syntax_set: SyntaxSet,
    theme: Theme,
}

// Loaded once per process; syntax and theme dumps are expensive to parse.
static HIGHLIGHT_ASSETS: OnceLock<Option<HighlightAssets>> = OnceLock::new();

fn highlight_assets() -> Option<&'static HighlightAssets> {
    HIGHLIGHT_ASSETS
        .get_or_init(|| {
            let syntax_set = SyntaxSet::load_defaults_newlines();
            let theme_set = ThemeSet::load_defaults();
            let theme = theme_set
                .themes
                .get(THEME_NAME)
                .cloned()
                .or_else(|| theme_set.themes.values().next().cloned())?;
            Some(HighlightAssets { syntax_set, theme })
        })
        .as_ref()
}

/// Map common fence tags onto tokens the default syntax set knows.
fn canonical_language(lang: &str) -> String {
    let lang = lang.trim().to_ascii_lowercase();
    let mapped = match lang.as_str() {
        "ts" | "typescript" | "tsx" | "jsx" | "javascript" | "node" => "js",
        "shell" | "bash" | "zsh" | "console" | "shellscript" => "sh",
        "python" | "python3" => "py",
        "rust" => "rs",
        "yml" => "yaml",
        "c++" | "cpp" => "cpp",
        "golang" => "go",
        "markdown" | "md" => "md",
        other => other,
    };
    mapped.to_string()
}

fn find_syntax<'a>(syntax_set: &'a SyntaxSet, lang: &str) -> Option<&'a SyntaxReference> {
    syntax_set.find_syntax_by_token(&canonical_language(lang))
}

fn code_style() -> Style {
    Style::default().fg(Color::Gray)
}

fn convert_style(style: SyntectStyle) -> Style {
    let mut converted = Style::default().fg(Color::Rgb(
        style.foreground.r,
        style.foreground.g,
        style.foreground.b,
    ));
    if style.font_style.contains(FontStyle::BOLD) {
        converted = converted.add_modifier(Modifier::BOLD);
    }
    if style.font_style.contains(FontStyle::ITALIC) {
        converted = converted.add_modifier(Modifier::ITALIC);
    }
    if style.font_style.contains(FontStyle::UNDERLINE) {
        converted = converted.add_modifier(Modifier::UNDERLINED);
    }
    converted
}

fn plain_lines(code: &str) -> Vec<Line<'static>> {
    code.lines()
        .map(|line| Line::from(Span::styled(line.to_string(), code_style())))
        .collect()
}

/// Highlight a fenced code block. Unknown or missing languages fall back to
/// plain text; one output line per source line.
pub fn highlight_code(code: &str, lang: Option<&str>) -> Vec<Line<'static>> {
    let Some(assets) = highlight_assets() else {
        return plain_lines(code);
    };

    let syntax = lang
        .filter(|l| !l.trim().is_empty())
        .and_then(|l| find_syntax(&assets.syntax_set, l))
        .unwrap_or_else(|| assets.syntax_set.find_syntax_plain_text());
    let mut highlighter = HighlightLines::new(syntax, &assets.theme);

    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        let text = line.trim_end_matches(['\n', '\r']);
        match highlighter.highlight_line(line, &assets.syntax_set) {
            Ok(ranges) => {
                let spans: Vec<Span<'static>> = ranges
                    .into_iter()
                    .map(|(style, piece)| {
                        Span::styled(piece.trim_end_matches(['\n', '\r']).to_string(), convert_style(style))
                    })
                    .filter(|span| !span.content.is_empty())
                    .collect();
                lines.push(Line::from(spans));
            }
            Err(e) => {
                tracing::debug!(error = %e, "highlighting failed; using plain text");
                lines.push(Line::from(Span::styled(text.to_string(), code_style())));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_known_language_is_colored() {
        let lines = highlight_code("fn main() {\n    let x = 1;\n}\n", Some("rust"));
        assert_eq!(lines.len(), 3);
        assert_eq!(line_text(&lines[1]), "    let x = 1;");
        let colors: std::collections::HashSet<_> = lines
            .iter()
            .flat_map(|l| l.spans.iter().filter_map(|s| s.style.fg))
            .collect();
        assert!(colors.len() > 1, "expected several token colors");
    }

    #[test]
    fn test_unknown_language_keeps_text() {
        let lines = highlight_code("a\nb", Some("no-such-language"));
        assert_eq!(lines.iter().map(line_text).collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_aliases() {
        assert_eq!(canonical_language(" TypeScript "), "js");
        assert_eq!(canonical_language("bash"), "sh");
        assert_eq!(canonical_language("toml"), "toml");
    }
}
