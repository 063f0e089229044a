use std::io::{self, IsTerminal, Read};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::term;

/// Keyboard capability consumed by the machine.
///
/// `available` must never block; `read_byte` blocks until a byte arrives.
pub trait InputSource {
    fn available(&mut self) -> bool;
    fn read_byte(&mut self) -> io::Result<u8>;
}

/// Keyboard input backed by the host process' stdin.
pub enum HostInput {
    /// Interactive terminal, read through raw-mode key events.
    Terminal(TerminalInput),
    /// Piped or redirected stdin, drained by a reader thread so availability
    /// can be checked without blocking.
    Stdin(StdinInput),
}

impl HostInput {
    pub fn new() -> Self {
        if io::stdin().is_terminal() {
            HostInput::Terminal(TerminalInput::new())
        } else {
            HostInput::Stdin(StdinInput::new())
        }
    }
}

impl Default for HostInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for HostInput {
    fn available(&mut self) -> bool {
        match self {
            Self::Terminal(terminal) => terminal.available(),
            Self::Stdin(stdin) => stdin.available(),
        }
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        match self {
            Self::Terminal(terminal) => terminal.read_byte(),
            Self::Stdin(stdin) => stdin.read_byte(),
        }
    }
}

pub struct TerminalInput {
    /// Byte seen by a poll but not yet consumed by a read.
    pending: Option<u8>,
}

impl TerminalInput {
    fn new() -> Self {
        Self { pending: None }
    }
}

impl InputSource for TerminalInput {
    fn available(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = term::poll_byte();
        }
        self.pending.is_some()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        match self.pending.take() {
            Some(byte) => Ok(byte),
            None => Ok(term::read_byte()),
        }
    }
}

pub struct StdinInput {
    bytes: Receiver<u8>,
    pending: Option<u8>,
}

impl StdinInput {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for byte in io::stdin().bytes() {
                let Ok(byte) = byte else { break };
                if tx.send(byte).is_err() {
                    break;
                }
            }
        });
        Self {
            bytes: rx,
            pending: None,
        }
    }
}

impl InputSource for StdinInput {
    fn available(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = match self.bytes.try_recv() {
                Ok(byte) => Some(byte),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
            };
        }
        self.pending.is_some()
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        if let Some(byte) = self.pending.take() {
            return Ok(byte);
        }
        self.bytes
            .recv()
            .map_err(|_| io::Error::from(io::ErrorKind::UnexpectedEof))
    }
}
