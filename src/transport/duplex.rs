//! The duplex channel: a WebSocket client task with eager, fixed-backoff
//! reconnection.
//!
//! The task owns the socket for its whole life. Everything the backend
//! pushes (replies and connection transitions) flows out through one
//! inbound event channel registered at spawn time; outbound frames flow in
//! through an unbounded sender so [`DuplexChannel::emit`] never blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{info, warn};

use super::{DuplexLink, InboundEvent};
use crate::config::ClientConfig;
use crate::error::DracoError;
use crate::protocol::{parse_inbound, ClientFrame, UserCommand};
use crate::render::TransportStatus;

/// Handle to the background channel task.
pub struct DuplexChannel {
    outbound: mpsc::UnboundedSender<ClientFrame>,
    open: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl DuplexChannel {
    /// Spawn the channel task against `config.ws_url`.
    ///
    /// Connection is attempted immediately; every close or failure schedules
    /// the next attempt after `config.reconnect_delay`. All transitions are
    /// reported as [`InboundEvent::Status`] values on `events`.
    pub fn spawn(config: &ClientConfig, events: mpsc::UnboundedSender<InboundEvent>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_channel(
            config.ws_url.clone(),
            config.reconnect_delay,
            Arc::clone(&open),
            outbound_rx,
            events,
        ));
        Self {
            outbound,
            open,
            task,
        }
    }
}

impl DuplexLink for DuplexChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn emit(&self, command: &UserCommand) -> Result<(), DracoError> {
        if !self.is_open() {
            return Err(DracoError::ChannelClosed);
        }
        self.outbound
            .send(ClientFrame::UserCommand {
                text: command.text.clone(),
            })
            .map_err(|_| DracoError::ChannelClosed)
    }
}

impl Drop for DuplexChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_channel(
    ws_url: String,
    reconnect_delay: Duration,
    open: Arc<AtomicBool>,
    mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
    events: mpsc::UnboundedSender<InboundEvent>,
) {
    loop {
        if events
            .send(InboundEvent::Status(TransportStatus::Connecting))
            .is_err()
        {
            return; // session is gone
        }

        match connect_async(ws_url.as_str()).await {
            Ok((stream, _)) => {
                open.store(true, Ordering::SeqCst);
                info!(url = %ws_url, "bridge connected");
                let _ = events.send(InboundEvent::Status(TransportStatus::Connected));

                let (mut sink, mut read) = stream.split();
                loop {
                    tokio::select! {
                        frame = outbound.recv() => match frame {
                            Some(frame) => {
                                let text = match serde_json::to_string(&frame) {
                                    Ok(t) => t,
                                    Err(e) => {
                                        warn!(error = %e, "dropping unserializable frame");
                                        continue;
                                    }
                                };
                                if sink.send(WsMessage::Text(text)).await.is_err() {
                                    break;
                                }
                            }
                            // Every sender handle is gone: nothing left to do.
                            None => return,
                        },
                        msg = read.next() => match msg {
                            Some(Ok(WsMessage::Text(text))) => {
                                let _ = events.send(InboundEvent::Reply(parse_inbound(&text)));
                            }
                            Some(Ok(WsMessage::Binary(data))) => {
                                if let Ok(text) = String::from_utf8(data) {
                                    let _ = events.send(InboundEvent::Reply(parse_inbound(&text)));
                                }
                            }
                            Some(Ok(WsMessage::Close(_))) | None => break,
                            Some(Ok(_)) => continue, // ping/pong
                            Some(Err(e)) => {
                                warn!(error = %e, "bridge read error");
                                break;
                            }
                        },
                    }
                }
                open.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(url = %ws_url, error = %e, "bridge connection failed");
            }
        }

        if events
            .send(InboundEvent::Status(TransportStatus::Disconnected))
            .is_err()
        {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    const TICK: Duration = Duration::from_secs(2);

    fn test_config(port: u16) -> ClientConfig {
        let mut cfg = ClientConfig::new(
            format!("http://127.0.0.1:{port}"),
            format!("ws://127.0.0.1:{port}"),
        );
        cfg.reconnect_delay = Duration::from_millis(50);
        cfg
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<InboundEvent>) -> InboundEvent {
        timeout(TICK, rx.recv())
            .await
            .expect("event within deadline")
            .expect("channel alive")
    }

    async fn wait_for_status(
        rx: &mut mpsc::UnboundedReceiver<InboundEvent>,
        want: TransportStatus,
    ) {
        loop {
            if let InboundEvent::Status(got) = next_event(rx).await {
                if got == want {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_connects_and_reports_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let _ws = accept_async(socket).await.unwrap();
            // Hold the connection open.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = DuplexChannel::spawn(&test_config(port), tx);

        assert!(matches!(
            next_event(&mut rx).await,
            InboundEvent::Status(TransportStatus::Connecting)
        ));
        wait_for_status(&mut rx, TransportStatus::Connected).await;
        assert!(channel.is_open());
    }

    #[tokio::test]
    async fn test_emit_reaches_the_server_as_user_command() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            match ws.next().await {
                Some(Ok(WsMessage::Text(text))) => text,
                other => panic!("expected text frame, got {other:?}"),
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = DuplexChannel::spawn(&test_config(port), tx);
        wait_for_status(&mut rx, TransportStatus::Connected).await;

        channel.emit(&UserCommand::new("what time is it")).unwrap();

        let frame = timeout(TICK, server).await.unwrap().unwrap();
        let v: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "user_command");
        assert_eq!(v["text"], "what time is it");
    }

    #[tokio::test]
    async fn test_server_push_arrives_as_reply_event() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();
            ws.send(WsMessage::Text(
                r#"{"event":"draco_response","text":"hello there"}"#.to_string(),
            ))
            .await
            .unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _channel = DuplexChannel::spawn(&test_config(port), tx);
        wait_for_status(&mut rx, TransportStatus::Connected).await;

        match next_event(&mut rx).await {
            InboundEvent::Reply(reply) => {
                assert_eq!(reply.text.as_deref(), Some("hello there"));
            }
            other => panic!("expected reply, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_emit_while_closed_is_channel_closed() {
        // Bind and drop so the port refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = DuplexChannel::spawn(&test_config(port), tx);
        wait_for_status(&mut rx, TransportStatus::Disconnected).await;

        assert!(!channel.is_open());
        assert!(matches!(
            channel.emit(&UserCommand::new("hi")),
            Err(DracoError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_triggers_reconnect_after_backoff() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            // First connection: accept, then hang up immediately.
            let (socket, _) = listener.accept().await.unwrap();
            let ws = accept_async(socket).await.unwrap();
            drop(ws);
            // Second connection: hold open.
            let (socket, _) = listener.accept().await.unwrap();
            let _ws = accept_async(socket).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _channel = DuplexChannel::spawn(&test_config(port), tx);

        wait_for_status(&mut rx, TransportStatus::Connected).await;
        wait_for_status(&mut rx, TransportStatus::Disconnected).await;
        // The fixed backoff elapses, then the channel reconnects.
        wait_for_status(&mut rx, TransportStatus::Connecting).await;
        wait_for_status(&mut rx, TransportStatus::Connected).await;
    }
}
