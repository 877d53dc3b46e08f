//! Interactive updater selection

use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Print, PrintStyledContent, Stylize},
    terminal::{self, Clear, ClearType},
};
use std::io::{self, IsTerminal, Write};

/// One selectable entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Label shown to the operator
    pub name: String,
    /// Token merged into the request when selected (`foo`, `foo:lint`)
    pub value: String,
    /// Label echoed after the answer
    pub short: String,
}

/// Asks the operator which updaters and tasks to run
pub trait Prompt {
    /// Returns the `value` of every selected choice, in display order
    fn ask_updater_selection(&self, message: &str, choices: &[Choice]) -> Result<Vec<String>>;
}

/// Checkbox list drawn in the terminal
#[derive(Debug, Default)]
pub struct CheckboxPrompt;

struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

struct Checklist<'a> {
    choices: &'a [Choice],
    checked: Vec<bool>,
    cursor: usize,
}

impl<'a> Checklist<'a> {
    fn new(choices: &'a [Choice]) -> Self {
        Self {
            choices,
            checked: vec![false; choices.len()],
            cursor: 0,
        }
    }

    fn up(&mut self) {
        self.cursor = self.cursor.checked_sub(1).unwrap_or(self.choices.len() - 1);
    }

    fn down(&mut self) {
        self.cursor = (self.cursor + 1) % self.choices.len();
    }

    fn toggle(&mut self) {
        self.checked[self.cursor] = !self.checked[self.cursor];
    }

    fn toggle_all(&mut self) {
        let all = self.checked.iter().all(|c| *c);
        self.checked.iter_mut().for_each(|c| *c = !all);
    }

    fn selected(&self) -> impl Iterator<Item = &Choice> {
        self.choices
            .iter()
            .zip(&self.checked)
            .filter(|(_, checked)| **checked)
            .map(|(choice, _)| choice)
    }

    fn render(&self, out: &mut impl Write, message: &str, redraw: bool) -> io::Result<()> {
        if redraw {
            queue!(out, cursor::MoveUp(self.choices.len() as u16 + 1))?;
        }
        queue!(
            out,
            cursor::MoveToColumn(0),
            Clear(ClearType::FromCursorDown),
            PrintStyledContent("? ".green()),
            PrintStyledContent(message.bold()),
            Print(" (space to select, a to toggle all, enter to confirm)\r\n")
        )?;

        for (i, choice) in self.choices.iter().enumerate() {
            let mark = if self.checked[i] { "[x]" } else { "[ ]" };
            let line = format!("{} {}", mark, choice.name);
            if i == self.cursor {
                queue!(out, PrintStyledContent(format!("> {}", line).cyan()))?;
            } else {
                queue!(out, Print(format!("  {}", line)))?;
            }
            queue!(out, Print("\r\n"))?;
        }
        out.flush()
    }
}

impl Prompt for CheckboxPrompt {
    fn ask_updater_selection(&self, message: &str, choices: &[Choice]) -> Result<Vec<String>> {
        if choices.is_empty() {
            return Ok(Vec::new());
        }
        if !io::stdin().is_terminal() {
            anyhow::bail!("interactive selection requires a terminal");
        }

        let mut list = Checklist::new(choices);
        let mut out = io::stdout();
        let _raw = RawMode::enable()?;
        list.render(&mut out, message, false)?;

        loop {
            let Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                ..
            }) = event::read()?
            else {
                continue;
            };

            match code {
                KeyCode::Up | KeyCode::Char('k') => list.up(),
                KeyCode::Down | KeyCode::Char('j') => list.down(),
                KeyCode::Char(' ') => list.toggle(),
                KeyCode::Char('a') => list.toggle_all(),
                KeyCode::Enter => break,
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                    anyhow::bail!("selection cancelled")
                }
                KeyCode::Esc => anyhow::bail!("selection cancelled"),
                _ => continue,
            }
            list.render(&mut out, message, true)?;
        }

        let shorts: Vec<&str> = list.selected().map(|c| c.short.as_str()).collect();
        queue!(out, Print(format!("{}\r\n", shorts.join(", ").cyan())))?;
        out.flush()?;

        Ok(list.selected().map(|c| c.value.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<Choice> {
        ["a", "b", "c"]
            .iter()
            .map(|v| Choice {
                name: format!("updater-{v}"),
                value: v.to_string(),
                short: v.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_checklist_navigation_wraps() {
        let choices = choices();
        let mut list = Checklist::new(&choices);
        list.up();
        assert_eq!(list.cursor, 2);
        list.down();
        assert_eq!(list.cursor, 0);
    }

    #[test]
    fn test_checklist_selection_keeps_display_order() {
        let choices = choices();
        let mut list = Checklist::new(&choices);
        list.down();
        list.down();
        list.toggle();
        list.up();
        list.up();
        list.toggle();

        let values: Vec<_> = list.selected().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["a", "c"]);

        list.toggle_all();
        assert_eq!(list.selected().count(), 3);
        list.toggle_all();
        assert_eq!(list.selected().count(), 0);
    }

    #[test]
    fn test_render_writes_every_choice() {
        let choices = choices();
        let list = Checklist::new(&choices);
        let mut out = Vec::new();
        list.render(&mut out, "Pick", false).unwrap();

        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("Pick"));
        assert!(text.contains("updater-a"));
        assert!(text.contains("updater-c"));
    }
}
