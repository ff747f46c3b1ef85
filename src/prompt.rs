//! Operator decisions for each unit of an okify plan.
//!
//! Keys are read one at a time so menus react to a single keystroke. The key
//! source is a trait so the terminal can be swapped for a byte stream (piped
//! stdin, or a fixed script in tests).
use crate::display::{render_unit, Style};
use crate::interrupt;
use crate::model::OkifyOp;
use crate::plan::{Candidate, DecisionUnit, OpChoice};
use anyhow::{anyhow, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Color;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, BufRead, Write};

/// A single keystroke as seen by the prompter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    /// Ctrl-C.
    Interrupt,
    /// Input is exhausted.
    Closed,
    Other,
}

impl Key {
    fn describe(&self) -> String {
        match self {
            Key::Char(c) => c.to_string(),
            Key::Enter => "<enter>".to_string(),
            Key::Backspace => "<backspace>".to_string(),
            Key::Interrupt => "<ctrl-c>".to_string(),
            Key::Closed => "<eof>".to_string(),
            Key::Other => "<key>".to_string(),
        }
    }
}

pub trait KeySource {
    fn next_key(&mut self) -> Result<Key>;
}

/// Keys from the controlling terminal, read in raw mode one press at a time.
pub struct TerminalKeys;

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("enable terminal raw mode")?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

impl KeySource for TerminalKeys {
    fn next_key(&mut self) -> Result<Key> {
        if interrupt::interrupted() {
            return Ok(Key::Interrupt);
        }
        let _raw = RawModeGuard::enable()?;
        loop {
            if let Event::Key(key) = event::read().context("read terminal key")? {
                if key.kind == KeyEventKind::Press {
                    return Ok(key_from_event(key));
                }
            }
        }
    }
}

fn key_from_event(key: KeyEvent) -> Key {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        _ => Key::Other,
    }
}

/// Keys decoded byte by byte from a reader, used when stdin is not a terminal.
pub struct StreamKeys<R> {
    bytes: io::Bytes<R>,
}

impl<R: BufRead> StreamKeys<R> {
    pub fn new(reader: R) -> Self {
        Self {
            bytes: reader.bytes(),
        }
    }
}

impl<R: BufRead> KeySource for StreamKeys<R> {
    fn next_key(&mut self) -> Result<Key> {
        if interrupt::interrupted() {
            return Ok(Key::Interrupt);
        }
        match self.bytes.next() {
            None => Ok(Key::Closed),
            Some(byte) => Ok(key_from_byte(byte.context("read key from input")?)),
        }
    }
}

fn key_from_byte(byte: u8) -> Key {
    match byte {
        b'\n' | b'\r' => Key::Enter,
        0x7f | 0x08 => Key::Backspace,
        0x03 => Key::Interrupt,
        b' ' => Key::Char(' '),
        b if b.is_ascii_graphic() => Key::Char(b as char),
        _ => Key::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Interactive,
    /// Walk every unit and auto-accept; execution runs without remote mutation.
    DryRun,
}

/// What the operator settled on for an accepted unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub candidate: Candidate,
    pub op: OkifyOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Selection),
    Skipped,
    /// The operator quit at this unit; nothing after it is decided.
    Cancelled,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Accepted(_) => "accepted",
            Outcome::Skipped => "skipped",
            Outcome::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub unit: DecisionUnit,
    pub outcome: Outcome,
    /// Accepted during a dry run; the executor must not mutate remote state.
    pub preview: bool,
}

enum Step<T> {
    Chosen(T),
    Skip,
    Quit,
}

const QUIT: char = 'q';
const SKIP: char = 's';
const OKIFY: char = 'o';

pub struct Prompter<K, W> {
    keys: K,
    out: W,
    style: Style,
}

impl<K: KeySource, W: Write> Prompter<K, W> {
    pub fn new(keys: K, out: W, style: Style) -> Self {
        Self { keys, out, style }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.out
    }

    /// Decide every unit in order until the operator quits.
    ///
    /// Units after a quit get no decision at all.
    pub fn resolve(&mut self, units: &[DecisionUnit], mode: PromptMode) -> Result<Vec<Decision>> {
        let mut decisions = Vec::with_capacity(units.len());
        for (index, unit) in units.iter().enumerate() {
            write!(
                self.out,
                "{}",
                render_unit(unit, index, units.len(), &self.style)
            )?;
            let outcome = self.prompt_unit(unit, mode)?;
            tracing::debug!(
                truth = %unit.truth_path,
                outcome = outcome.label(),
                "unit decided"
            );
            let cancelled = outcome == Outcome::Cancelled;
            decisions.push(Decision {
                unit: unit.clone(),
                outcome,
                preview: mode == PromptMode::DryRun,
            });
            if cancelled {
                break;
            }
        }
        self.out.flush()?;
        Ok(decisions)
    }

    fn prompt_unit(&mut self, unit: &DecisionUnit, mode: PromptMode) -> Result<Outcome> {
        if mode == PromptMode::DryRun && unit.needs_choice() {
            return self.preview_choice(unit);
        }
        let op = match &unit.op {
            OpChoice::Agreed(op) => *op,
            OpChoice::Ambiguous(ops) => match self.choose_op(unit, ops)? {
                Step::Chosen(op) => op,
                Step::Skip => return Ok(Outcome::Skipped),
                Step::Quit => return Ok(Outcome::Cancelled),
            },
        };

        let candidate = match unit.candidates.as_slice() {
            [] => return Err(anyhow!("unit {} has no candidates", unit.truth_path)),
            [only] => only.clone(),
            _ => match self.choose_candidate(unit)? {
                Step::Chosen(candidate) => candidate,
                Step::Skip => return Ok(Outcome::Skipped),
                Step::Quit => return Ok(Outcome::Cancelled),
            },
        };
        let selection = Selection { candidate, op };

        if mode == PromptMode::DryRun {
            writeln!(
                self.out,
                "{}",
                self.style.paint(
                    &format!("dry run: would okify {} ({op})", unit.truth_path),
                    Color::Cyan
                )
            )?;
            return Ok(Outcome::Accepted(selection));
        }

        let commands = [
            (OKIFY, "okify".to_string(), Color::Green),
            (SKIP, "skip".to_string(), Color::Cyan),
            (QUIT, "quit".to_string(), Color::Magenta),
        ];
        Ok(match self.read_command(&commands)? {
            OKIFY => Outcome::Accepted(selection),
            SKIP => Outcome::Skipped,
            _ => Outcome::Cancelled,
        })
    }

    /// Show what a dry run cannot decide on its own and leave the unit alone.
    fn preview_choice(&mut self, unit: &DecisionUnit) -> Result<Outcome> {
        if let OpChoice::Ambiguous(ops) = &unit.op {
            self.write_op_warning(unit, ops)?;
        }
        if unit.candidates.len() > 1 {
            self.write_candidates(unit)?;
        }
        writeln!(
            self.out,
            "{}",
            self.style.paint(
                &format!("dry run: {} needs a choice, skipped", unit.truth_path),
                Color::Cyan
            )
        )?;
        Ok(Outcome::Skipped)
    }

    fn write_op_warning(&mut self, unit: &DecisionUnit, ops: &[OkifyOp]) -> Result<()> {
        let listed: Vec<&str> = ops.iter().map(OkifyOp::as_str).collect();
        let warning = format!(
            "warning: entries for {} disagree on the okify operation ({}); choose one",
            unit.truth_path,
            listed.join(", ")
        );
        writeln!(self.out, "{}", self.style.paint(&warning, Color::Yellow))?;
        Ok(())
    }

    fn write_candidates(&mut self, unit: &DecisionUnit) -> Result<()> {
        writeln!(
            self.out,
            "{} different outputs map to {}; exactly one may replace it:",
            unit.candidates.len(),
            unit.truth_path
        )?;
        for (index, candidate) in unit.candidates.iter().enumerate() {
            writeln!(
                self.out,
                "  [{}] {} ({})",
                index + 1,
                candidate.artifact,
                candidate.tests.join(", ")
            )?;
        }
        Ok(())
    }

    fn choose_op(&mut self, unit: &DecisionUnit, ops: &[OkifyOp]) -> Result<Step<OkifyOp>> {
        self.write_op_warning(unit, ops)?;

        let mut commands: Vec<(char, String, Color)> = OkifyOp::ALL
            .iter()
            .map(|op| (op.key(), format!("use {op}"), Color::Green))
            .collect();
        commands.push((SKIP, "skip".to_string(), Color::Cyan));
        commands.push((QUIT, "quit".to_string(), Color::Magenta));

        let key = self.read_command(&commands)?;
        Ok(match OkifyOp::ALL.iter().find(|op| op.key() == key) {
            Some(op) => Step::Chosen(*op),
            None if key == SKIP => Step::Skip,
            None => Step::Quit,
        })
    }

    fn choose_candidate(&mut self, unit: &DecisionUnit) -> Result<Step<Candidate>> {
        let count = unit.candidates.len();
        self.write_candidates(unit)?;

        let prompt = format!(
            "select one output [1-{count}] and press Enter ('{SKIP}' to skip, '{QUIT}' to quit): "
        );
        write!(self.out, "{prompt}")?;
        self.out.flush()?;

        let mut buffer = String::new();
        loop {
            match self.keys.next_key()? {
                Key::Char(SKIP) if buffer.is_empty() => {
                    writeln!(self.out)?;
                    return Ok(Step::Skip);
                }
                Key::Char(QUIT) if buffer.is_empty() => {
                    writeln!(self.out)?;
                    return Ok(Step::Quit);
                }
                Key::Interrupt | Key::Closed => {
                    writeln!(self.out)?;
                    return Ok(Step::Quit);
                }
                Key::Char(c) if c.is_ascii_digit() || c == ',' || c == ' ' => {
                    buffer.push(c);
                    write!(self.out, "{c}")?;
                }
                Key::Backspace => {
                    if buffer.pop().is_some() {
                        write!(self.out, "\u{8} \u{8}")?;
                    }
                }
                Key::Enter => {
                    writeln!(self.out)?;
                    match parse_selection(&buffer, count) {
                        Ok(index) => return Ok(Step::Chosen(unit.candidates[index].clone())),
                        Err(message) => {
                            writeln!(self.out, "{message}, try again")?;
                            buffer.clear();
                            write!(self.out, "{prompt}")?;
                        }
                    }
                }
                other => {
                    writeln!(self.out)?;
                    writeln!(
                        self.out,
                        "Unrecognized key '{}', try again",
                        other.describe()
                    )?;
                    write!(self.out, "{prompt}{buffer}")?;
                }
            }
            self.out.flush()?;
        }
    }

    /// Show a single-key menu until one of `commands` is pressed.
    ///
    /// Ctrl-C and end of input count as quit.
    fn read_command(&mut self, commands: &[(char, String, Color)]) -> Result<char> {
        let menu: Vec<String> = commands
            .iter()
            .map(|(key, verb, color)| self.style.paint(&format!("'{key}' to {verb}"), *color))
            .collect();
        let menu = menu.join(", ");
        loop {
            write!(self.out, "{menu}: ")?;
            self.out.flush()?;
            let key = self.keys.next_key()?;
            match key {
                Key::Char(c) if commands.iter().any(|(command, _, _)| *command == c) => {
                    writeln!(self.out, "{c}")?;
                    return Ok(c);
                }
                Key::Interrupt | Key::Closed => {
                    writeln!(self.out)?;
                    tracing::warn!(key = %key.describe(), "input ended, quitting");
                    return Ok(QUIT);
                }
                other => {
                    writeln!(self.out)?;
                    writeln!(
                        self.out,
                        "Unrecognized command '{}', try again",
                        other.describe()
                    )?;
                }
            }
        }
    }
}

/// Parse a typed candidate selection into a zero-based index.
fn parse_selection(buffer: &str, count: usize) -> std::result::Result<usize, String> {
    let tokens: Vec<&str> = buffer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();
    let token = match tokens.as_slice() {
        [] => return Err("no output selected".to_string()),
        [token] => *token,
        _ => return Err("select exactly one output".to_string()),
    };
    let number: usize = token
        .parse()
        .map_err(|_| format!("invalid selection {token:?}"))?;
    if number == 0 || number > count {
        return Err(format!("selection {number} is out of range 1-{count}"));
    }
    Ok(number - 1)
}
