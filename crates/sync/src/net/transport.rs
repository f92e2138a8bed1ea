use std::io;

/// Raised by a [`Transport`] and drained by its owner during the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed {
        code: u16,
        reason: String,
        clean: bool,
    },
}

/// A persistent text-frame socket. I/O may happen elsewhere, but results only
/// become visible through [`Transport::poll`], so every state change is
/// observed serially on the caller's tick.
pub trait Transport {
    /// Starts opening a connection to `url`. Completion is reported later as
    /// [`TransportEvent::Opened`] or an error/close event.
    fn open(&mut self, url: &str) -> io::Result<()>;

    fn send(&mut self, text: &str) -> io::Result<()>;

    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn poll(&mut self) -> Vec<TransportEvent>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, url: &str) -> io::Result<()> {
        (**self).open(url)
    }

    fn send(&mut self, text: &str) -> io::Result<()> {
        (**self).send(text)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        (**self).poll()
    }
}
