//! Interactive prompts
//!
//! Questions are asked on a writer and answered line by line from a
//! reader, so the interactive workflow runs the same against a terminal
//! or a scripted buffer.

use std::io::{BufRead, Write};

use crossterm::style::Stylize;

use crate::error::PromptError;

/// Source of answers to questions
pub trait Prompt {
    /// Ask for a value; blank input takes `default`, blank without default re-asks
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String, PromptError>;

    /// Print a line of feedback between questions
    fn say(&mut self, message: &str) -> Result<(), PromptError>;

    /// Print an error line and let the caller re-ask
    fn complain(&mut self, message: &str) -> Result<(), PromptError> {
        self.say(&message.red().to_string())
    }

    /// y/yes or n/no, case-insensitive
    fn ask_yes_no(&mut self, question: &str, default: bool) -> Result<bool, PromptError> {
        let default_str = if default { "y" } else { "n" };
        loop {
            let answer = self
                .ask(&format!("{question} (y/n)"), Some(default_str))?
                .to_lowercase();
            match answer.as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.complain("Invalid input. Enter 'y'/'yes' or 'n'/'no'.")?,
            }
        }
    }

    /// Whole number accepted by `check`, re-asking on anything else
    fn ask_number(
        &mut self,
        question: &str,
        default: usize,
        check: &dyn Fn(usize) -> Result<(), String>,
    ) -> Result<usize, PromptError> {
        let default_str = default.to_string();
        loop {
            let answer = self.ask(question, Some(default_str.as_str()))?;
            match answer.parse::<usize>() {
                Ok(n) => match check(n) {
                    Ok(()) => return Ok(n),
                    Err(message) => self.complain(&message)?,
                },
                Err(_) => self.complain(&format!("'{answer}' is not a number."))?,
            }
        }
    }
}

/// Prompt over any reader and writer
pub struct TerminalPrompt<R, W> {
    reader: R,
    writer: W,
}

impl TerminalPrompt<std::io::StdinLock<'static>, Box<dyn Write>> {
    /// Prompt on the process terminal
    ///
    /// Questions and feedback go to stderr when `to_stderr` is set, which
    /// keeps stdout for machine-readable output.
    pub fn stdio(to_stderr: bool) -> Self {
        let writer: Box<dyn Write> = if to_stderr {
            Box::new(std::io::stderr())
        } else {
            Box::new(std::io::stdout())
        };
        Self::new(std::io::stdin().lock(), writer)
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Give back the writer (for inspecting scripted sessions)
    pub fn into_writer(self) -> W {
        self.writer
    }
}

impl<R: BufRead, W: Write> Prompt for TerminalPrompt<R, W> {
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String, PromptError> {
        let text = match default {
            Some(d) if !d.is_empty() => format!("{question} [{d}]: "),
            _ => format!("{question}: "),
        };
        loop {
            write!(self.writer, "{text}")?;
            self.writer.flush()?;

            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Err(PromptError::InputClosed {
                    prompt: question.to_string(),
                });
            }
            let answer = line.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
            match default {
                Some(d) if !d.is_empty() => return Ok(d.to_string()),
                _ => self.complain("Field is required.")?,
            }
        }
    }

    fn say(&mut self, message: &str) -> Result<(), PromptError> {
        writeln!(self.writer, "{message}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scripted(input: &str) -> TerminalPrompt<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalPrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn transcript(prompt: TerminalPrompt<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(prompt.into_writer()).unwrap()
    }

    #[test]
    fn test_ask_uses_default_on_blank() {
        let mut prompt = scripted("\n");
        assert_eq!(prompt.ask("Enter cluster name", Some("talos-demo")).unwrap(), "talos-demo");
        assert!(transcript(prompt).contains("Enter cluster name [talos-demo]: "));
    }

    #[test]
    fn test_ask_trims_answer() {
        let mut prompt = scripted("  prod  \n");
        assert_eq!(prompt.ask("Enter cluster name", Some("talos-demo")).unwrap(), "prod");
    }

    #[test]
    fn test_ask_required_reasks() {
        let mut prompt = scripted("\n10.0.0.1\n");
        assert_eq!(prompt.ask("Enter default gateway", None).unwrap(), "10.0.0.1");
        assert!(transcript(prompt).contains("Field is required."));
    }

    #[test]
    fn test_ask_input_closed() {
        let mut prompt = scripted("");
        let err = prompt.ask("Enter default gateway", None).unwrap_err();
        assert!(matches!(err, PromptError::InputClosed { .. }));
    }

    #[test]
    fn test_yes_no_variants() {
        let mut prompt = scripted("YES\nn\nmaybe\ny\n\n");
        assert!(prompt.ask_yes_no("Enable drbd support?", false).unwrap());
        assert!(!prompt.ask_yes_no("Enable zfs support?", true).unwrap());
        assert!(prompt.ask_yes_no("Continue?", false).unwrap());
        assert!(!prompt.ask_yes_no("Enable spl support?", false).unwrap());
        let out = transcript(prompt);
        assert!(out.contains("Enable drbd support? (y/n) [n]: "));
        assert!(out.contains("Invalid input."));
    }

    #[test]
    fn test_ask_number_reasks_until_valid() {
        let mut prompt = scripted("abc\n4\n3\n");
        let n = prompt
            .ask_number("Enter number of control planes (odd, max 7)", 1, &|n| {
                if n % 2 == 1 && n <= 7 {
                    Ok(())
                } else {
                    Err("Enter an odd number between 1 and 7.".to_string())
                }
            })
            .unwrap();
        assert_eq!(n, 3);
        let out = transcript(prompt);
        assert!(out.contains("'abc' is not a number."));
        assert!(out.contains("Enter an odd number between 1 and 7."));
    }

    #[test]
    fn test_ask_number_default() {
        let mut prompt = scripted("\n");
        assert_eq!(prompt.ask_number("Workers", 3, &|_| Ok(())).unwrap(), 3);
    }
}
