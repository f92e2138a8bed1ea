use std::io;

use eon::{Transport, TransportEvent};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const CLOSE_ABNORMAL: u16 = 1006;
const CLOSE_NO_STATUS: u16 = 1005;

/// WebSocket I/O on a tokio task. Frames and lifecycle changes cross back to
/// the tick thread through a channel drained by [`Transport::poll`].
pub struct WsTransport {
    runtime: Handle,
    outgoing: Option<UnboundedSender<String>>,
    incoming: Option<UnboundedReceiver<TransportEvent>>,
    task: Option<JoinHandle<()>>,
    open: bool,
}

impl WsTransport {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            outgoing: None,
            incoming: None,
            task: None,
            open: false,
        }
    }

    fn shutdown_task(&mut self) {
        // Dropping the sender makes the task send a close frame and exit.
        self.outgoing = None;
        self.incoming = None;
        self.task = None;
        self.open = false;
    }
}

impl Transport for WsTransport {
    fn open(&mut self, url: &str) -> io::Result<()> {
        self.shutdown_task();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        self.task = Some(self.runtime.spawn(run_socket(url.to_string(), out_rx, event_tx)));
        self.outgoing = Some(out_tx);
        self.incoming = Some(event_rx);
        Ok(())
    }

    fn send(&mut self, text: &str) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket not open"));
        }

        let Some(outgoing) = self.outgoing.as_ref() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket not open"));
        };

        outgoing
            .send(text.to_string())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "socket task exited"))
    }

    fn close(&mut self) {
        self.shutdown_task();
    }

    fn is_open(&self) -> bool {
        self.open && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let Some(incoming) = self.incoming.as_mut() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        while let Ok(event) = incoming.try_recv() {
            match &event {
                TransportEvent::Opened => self.open = true,
                TransportEvent::Error(_) | TransportEvent::Closed { .. } => self.open = false,
                TransportEvent::Message(_) => {}
            }
            events.push(event);
        }
        events
    }
}

async fn run_socket(
    url: String,
    mut outgoing: UnboundedReceiver<String>,
    events: UnboundedSender<TransportEvent>,
) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let _ = events.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };

    let _ = events.send(TransportEvent::Opened);
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outbound = outgoing.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    return;
                }
            },
            inbound = source.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    let _ = events.send(TransportEvent::Closed {
                        code,
                        reason,
                        clean: true,
                    });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(TransportEvent::Error(e.to_string()));
                    return;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed {
                        code: CLOSE_ABNORMAL,
                        reason: "stream ended".to_string(),
                        clean: false,
                    });
                    return;
                }
            },
        }
    }
}
