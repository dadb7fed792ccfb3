//! Remote session over a serial line (modem or null-modem cable).
//!
//! Door programs of this era open the COM port themselves, so while one runs the
//! line is released entirely: [`RemoteIo::close`] drops the port handle and
//! [`RemoteIo::open`] opens the device again afterwards.
use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info};
use serialport::SerialPort;

use super::terminal::Terminal;
use crate::exec::RemoteIo;

pub struct SerialLine {
    path: String,
    baud_rate: u32,
    port: Option<Box<dyn SerialPort>>,
}

fn open_port(path: &str, baud_rate: u32) -> serialport::Result<Box<dyn SerialPort>> {
    let mut builder = serialport::new(path, baud_rate).timeout(Duration::from_millis(500));
    #[cfg(unix)]
    {
        builder = builder
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None);
    }
    builder.open()
}

impl SerialLine {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = open_port(path, baud_rate)
            .map_err(|e| anyhow!("Failed to open serial port {}: {}", path, e))?;
        info!("serial line open on {} @ {} baud", path, baud_rate);
        Ok(SerialLine {
            path: path.to_string(),
            baud_rate,
            port: Some(port),
        })
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial line released"))
    }
}

impl RemoteIo for SerialLine {
    fn close(&mut self, temporary: bool) {
        if let Some(mut port) = self.port.take() {
            let _ = port.flush();
            debug!("serial line {} released (temporary={})", self.path, temporary);
        }
    }

    fn open(&mut self) -> io::Result<()> {
        if self.port.is_none() {
            self.port = Some(open_port(&self.path, self.baud_rate)?);
            debug!("serial line {} reacquired", self.path);
        }
        Ok(())
    }
}

impl Terminal for SerialLine {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        let port = self.port()?;
        port.write_all(text.as_bytes())?;
        port.flush()
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port()?.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => match byte[0] {
                    b'\r' | b'\n' => break,
                    // backspace / delete
                    0x08 | 0x7f => {
                        if line.pop().is_some() {
                            self.port()?.write_all(b"\x08 \x08")?;
                        }
                    }
                    b => {
                        line.push(b);
                        self.port()?.write_all(&byte)?;
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}
