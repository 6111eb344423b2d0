use anyhow::{bail, Context, Result};
use inquire::Text;
use is_terminal::IsTerminal;
use std::io::{self, BufRead, Write};

/// Source of interactive answers.
pub trait Prompter {
    /// Ask `question` and return the trimmed answer.
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Asks on the terminal with `inquire`; falls back to reading one line per
/// question when stdin is piped.
#[derive(Debug, Default)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        if io::stdin().is_terminal() {
            let answer = Text::new(question)
                .prompt()
                .with_context(|| format!("Failed to read answer to '{question}'"))?;
            return Ok(answer.trim().to_string());
        }

        read_answer(&mut io::stdin().lock(), &mut io::stdout().lock(), question)
    }
}

fn read_answer(input: &mut dyn BufRead, output: &mut dyn Write, question: &str) -> Result<String> {
    write!(output, "{question} ").context("Failed to write prompt")?;
    output.flush().context("Failed to flush prompt")?;

    let mut answer = String::new();
    let read = input
        .read_line(&mut answer)
        .context("Failed to read answer from stdin")?;
    if read == 0 {
        bail!("stdin closed while waiting for an answer to '{question}'");
    }

    Ok(answer.trim().to_string())
}
