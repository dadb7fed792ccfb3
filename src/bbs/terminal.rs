//! The caller's screen and keyboard.
//!
//! A [`Terminal`] is also the session's [`RemoteIo`]: the same connection that
//! carries menus is the one handed over to a door program.
use std::io::{self, BufRead, Write};

use crate::exec::RemoteIo;

pub trait Terminal: RemoteIo {
    fn write_str(&mut self, text: &str) -> io::Result<()>;

    /// Next line of input without its line ending; `None` once the caller hangs up.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Ask a yes/no question; anything but `Y`/`YES` (or a hangup) is no.
    fn yes_no(&mut self) -> io::Result<bool> {
        let answer = self.read_line()?;
        self.write_str("\r\n")?;
        Ok(matches!(
            answer.as_deref().map(|a| a.trim().to_ascii_uppercase()).as_deref(),
            Some("Y") | Some("YES")
        ))
    }

    fn pause(&mut self) -> io::Result<()> {
        self.write_str("[PAUSE]")?;
        self.read_line()?;
        self.write_str("\r\n")
    }
}

/// Local console session on the process's stdin/stdout.
#[derive(Debug, Default)]
pub struct ConsoleTerminal;

impl RemoteIo for ConsoleTerminal {
    fn close(&mut self, _temporary: bool) {
        // the door inherits stdout; get our output out first
        let _ = io::stdout().flush();
    }

    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Terminal for ConsoleTerminal {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.replace("\r\n", "\n").as_bytes())?;
        out.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
