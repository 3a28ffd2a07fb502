//! User interaction operations (confirmation prompts).

use anyhow::Result;

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Core, testable implementation that reads from any BufRead and writes to any Write.
///
/// An empty answer (or end of input) selects the default. Otherwise the first
/// non-blank character decides: `y`/`Y` confirms, `n`/`N` declines, anything
/// else asks again.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    default_yes: bool,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    let choices = if default_yes { "[Y/n]" } else { "[y/N]" };

    loop {
        write!(output, "{} {} ", prompt, choices)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(default_yes);
        }

        match line.trim().chars().next() {
            None => return Ok(default_yes),
            Some('y' | 'Y') => return Ok(true),
            Some('n' | 'N') => return Ok(false),
            Some(_) => continue,
        }
    }
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str, default_yes: bool) -> Result<bool> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        confirm_with_io(prompt, default_yes, &mut stdin_lock, &mut stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::confirm_with_io;
    use anyhow::Result;
    use std::io::Cursor;

    fn answer(default_yes: bool, input: &str) -> Result<bool> {
        let mut input = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        confirm_with_io("Continue?", default_yes, &mut input, &mut output)
    }

    #[test]
    fn empty_answer_selects_default() -> Result<()> {
        assert!(answer(true, "\n")?);
        assert!(answer(true, "  \n")?);
        assert!(!answer(false, "\n")?);
        assert!(!answer(false, "")?);
        Ok(())
    }

    #[test]
    fn first_character_decides() -> Result<()> {
        assert!(!answer(true, "  no\n")?);
        assert!(answer(true, " yes\n")?);
        assert!(answer(true, " Ys\n")?);
        assert!(!answer(false, "  no\n")?);
        assert!(answer(false, "  yes\n")?);
        Ok(())
    }

    #[test]
    fn unknown_answer_asks_again() -> Result<()> {
        let mut input = Cursor::new(b"maybe\nn\n".to_vec());
        let mut output = Vec::new();
        let ok = confirm_with_io("Delete?", true, &mut input, &mut output)?;
        assert!(!ok);
        let out = String::from_utf8(output)?;
        assert_eq!(out, "Delete? [Y/n] Delete? [Y/n] ");
        Ok(())
    }

    #[test]
    fn prompt_shows_default_choice() -> Result<()> {
        let mut input = Cursor::new(b"n\n".to_vec());
        let mut output = Vec::new();
        let _ = confirm_with_io("Are you sure", false, &mut input, &mut output)?;
        assert_eq!(String::from_utf8(output)?, "Are you sure [y/N] ");
        Ok(())
    }
}
