//! Operator-facing rendering of decision units.
use crate::plan::DecisionUnit;
use crossterm::style::{Color, Stylize};

const FALLBACK_WIDTH: usize = 80;
const MIN_WIDTH: usize = 20;
const RULE: &str = "—";

/// Layout and colour settings for console output.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub width: usize,
    pub color: bool,
}

impl Style {
    /// Coloured style sized to the terminal, or plain output when `terminal`
    /// is false (piped or redirected stdout).
    pub fn detect(terminal: bool) -> Self {
        if !terminal {
            return Self::plain();
        }
        let width = crossterm::terminal::size()
            .map(|(columns, _)| columns as usize)
            .unwrap_or(FALLBACK_WIDTH);
        Self {
            width: width.max(MIN_WIDTH),
            color: true,
        }
    }

    pub fn plain() -> Self {
        Self {
            width: FALLBACK_WIDTH,
            color: false,
        }
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.color {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Center `title` in a rule of `width` characters.
pub fn banner(title: &str, width: usize) -> String {
    let title_len = title.chars().count();
    if title_len >= width {
        return title.to_string();
    }
    let pad = width - title_len;
    let left = pad / 2;
    let right = pad - left;
    format!("{}{title}{}", RULE.repeat(left), RULE.repeat(right))
}

/// Render one unit the way it is shown before the operator decides on it.
pub fn render_unit(unit: &DecisionUnit, index: usize, total: usize, style: &Style) -> String {
    let mut out = String::new();
    let title = format!(" {} ", unit.test_names().join(", "));
    push_line(&mut out, &style.paint(&banner(&title, style.width), Color::Red));

    for candidate in &unit.candidates {
        for traceback in &candidate.tracebacks {
            push_line(&mut out, traceback.trim_end());
        }
    }
    push_line(&mut out, &style.paint(&RULE.repeat(style.width), Color::Red));

    for candidate in &unit.candidates {
        push_line(
            &mut out,
            &style.paint(&format!("OK: {}", candidate.artifact), Color::Green),
        );
    }
    push_line(
        &mut out,
        &style.paint(&format!("--> {}", unit.truth_path), Color::Green),
    );
    let counter = format!("[ test {} of {} ]", index + 1, total);
    push_line(&mut out, &style.paint(&banner(&counter, style.width), Color::Red));
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}
