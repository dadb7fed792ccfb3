//! Chain command line templates.
//!
//! A chain's `filename` is a template such as `doors/tw2002 %1 %2 %3`. Before a
//! launch the orchestrator substitutes the session's positional values:
//! `%1` chain interchange file, `%2` modem speed, `%3` primary port, `%4` modem
//! speed. The launcher only ever sees the expanded, opaque shell command line.
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandLineError {
    #[error("command line is empty")]
    Empty,
    #[error("command line contains a NUL byte at offset {0}")]
    InteriorNul(usize),
}

/// Reject command lines that can never be handed to the interpreter.
///
/// Whitespace-only counts as empty.
pub fn validate_command_line(command_line: &str) -> Result<&str, CommandLineError> {
    if command_line.trim().is_empty() {
        return Err(CommandLineError::Empty);
    }
    if let Some(pos) = command_line.find('\0') {
        return Err(CommandLineError::InteriorNul(pos));
    }
    Ok(command_line)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    template: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(template: impl Into<String>) -> Self {
        CommandLine {
            template: template.into(),
            args: Vec::new(),
        }
    }

    /// Set the positional arguments; the first becomes `%1`.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Expand `%1`..`%9` and `%%`. A position with no argument expands to nothing;
    /// any other `%x` is copied through unchanged.
    pub fn expand(&self) -> String {
        let mut out = String::with_capacity(self.template.len() + 32);
        let mut chars = self.template.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            match chars.peek().copied() {
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                Some(d @ '1'..='9') => {
                    chars.next();
                    let idx = d as usize - '1' as usize;
                    if let Some(arg) = self.args.get(idx) {
                        out.push_str(arg);
                    }
                }
                _ => out.push('%'),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_chain_positionals() {
        let cl = CommandLine::new("doors/lord %1 %2 -p%3 -b%4").args([
            "/bbs/temp/s1/chain.txt",
            "38400",
            "1",
            "38400",
        ]);
        assert_eq!(
            cl.expand(),
            "doors/lord /bbs/temp/s1/chain.txt 38400 -p1 -b38400"
        );
    }

    #[test]
    fn missing_args_expand_empty_and_unknown_tokens_pass_through() {
        let cl = CommandLine::new("run %5 100%% %x %").args(["a"]);
        assert_eq!(cl.expand(), "run  100% %x %");
    }

    #[test]
    fn validation_rejects_empty_and_nul() {
        assert_eq!(validate_command_line(""), Err(CommandLineError::Empty));
        assert_eq!(validate_command_line("   \t"), Err(CommandLineError::Empty));
        assert_eq!(
            validate_command_line("echo a\0b"),
            Err(CommandLineError::InteriorNul(6))
        );
        assert_eq!(validate_command_line("echo hi"), Ok("echo hi"));
    }
}
