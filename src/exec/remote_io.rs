use log::{debug, error};
use std::io;

/// The session's live connection (serial line, telnet socket, local console).
///
/// Before a door program that needs the transport to itself is spawned, the
/// launcher asks the channel to let go of it and takes it back afterwards.
pub trait RemoteIo {
    /// Release the underlying transport. `temporary` is true when a reopen will
    /// follow once the external program exits.
    fn close(&mut self, temporary: bool);

    /// Re-acquire the transport after a temporary close.
    fn open(&mut self) -> io::Result<()>;
}

impl<R: RemoteIo + ?Sized> RemoteIo for Box<R> {
    fn close(&mut self, temporary: bool) {
        (**self).close(temporary)
    }

    fn open(&mut self) -> io::Result<()> {
        (**self).open()
    }
}

/// Holds the transport closed; reopens it exactly once when dropped.
pub struct TransportGuard<'a, R: RemoteIo + ?Sized> {
    io: &'a mut R,
}

impl<'a, R: RemoteIo + ?Sized> TransportGuard<'a, R> {
    pub fn release(io: &'a mut R) -> Self {
        debug!("releasing session transport for external program");
        io.close(true);
        TransportGuard { io }
    }
}

impl<R: RemoteIo + ?Sized> Drop for TransportGuard<'_, R> {
    fn drop(&mut self) {
        if let Err(e) = self.io.open() {
            error!("failed to reopen session transport: {}", e);
        } else {
            debug!("session transport reopened");
        }
    }
}

/// Channel for sessions sitting at the local console; nothing to hand over.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalIo;

impl RemoteIo for LocalIo {
    fn close(&mut self, _temporary: bool) {}

    fn open(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counting {
        closes: Vec<bool>,
        opens: usize,
        fail_open: bool,
    }

    impl RemoteIo for Counting {
        fn close(&mut self, temporary: bool) {
            self.closes.push(temporary);
        }
        fn open(&mut self) -> io::Result<()> {
            self.opens += 1;
            if self.fail_open {
                Err(io::Error::new(io::ErrorKind::NotConnected, "gone"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn guard_pairs_close_and_open() {
        let mut io = Counting::default();
        {
            let _guard = TransportGuard::release(&mut io);
        }
        assert_eq!(io.closes, vec![true]);
        assert_eq!(io.opens, 1);
    }

    #[test]
    fn reopen_failure_is_swallowed() {
        let mut io = Counting {
            fail_open: true,
            ..Default::default()
        };
        drop(TransportGuard::release(&mut io));
        assert_eq!(io.opens, 1);
    }
}
