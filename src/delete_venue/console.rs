use super::{Confirm, Navigator};
use anyhow::{Context, Result};
use std::io::{self, BufRead, Write};
use url::Url;

/// Asks on stdout and reads the answer from stdin.
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, message: &str) -> bool {
        print!("{message} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

/// Confirms without asking, for `--yes`.
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// "Navigates" by printing the absolute URL of the destination.
pub struct ConsoleNavigator {
    base_url: Url,
}

impl ConsoleNavigator {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid client.base_url {base_url}"))?;
        Ok(Self { base_url })
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, location: &str) -> Result<()> {
        let url = self
            .base_url
            .join(location)
            .with_context(|| format!("Cannot resolve {location}"))?;
        println!("{url}");
        Ok(())
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes("  YES \r\n"));
        assert!(is_yes("Yes"));
    }

    #[test]
    fn anything_else_is_no() {
        assert!(!is_yes("\n"));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
        assert!(!is_yes(""));
    }

    #[test]
    fn navigator_rejects_bad_base_url() {
        assert!(ConsoleNavigator::new("not a url").is_err());
    }
}
