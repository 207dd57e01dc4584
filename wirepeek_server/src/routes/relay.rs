//! Relay: bridges a viewer-facing WebSocket to the target server
//!
//! Every text and binary frame is captured before it is forwarded.

use crate::routes::AppState;
use axum::{
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    response::Response,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{
    self,
    client::IntoClientRequest,
    protocol::{frame::coding::CloseCode, CloseFrame},
};
use wirepeek_common::{constants, Direction, FramePayload, HeaderBag};

/// Handshake headers tungstenite generates itself
const HANDSHAKE_HEADERS: &[&str] = &[
    "sec-websocket-key",
    "sec-websocket-version",
    "sec-websocket-extensions",
];

pub fn upgrade(ws: WebSocketUpgrade, state: AppState, path_and_query: String, headers: HeaderBag) -> Response {
    ws.on_upgrade(move |socket| relay(socket, state, path_and_query, headers))
}

async fn relay(socket: WebSocket, state: AppState, path_and_query: String, headers: HeaderBag) {
    let url = state.config.upstream_ws_url(&path_and_query);

    let upstream = match connect_upstream(&url, headers).await {
        Ok(stream) => stream,
        Err(e) => {
            state.capture.log_error(&e, Some("GET"), Some(&path_and_query));
            state.metrics.record_connection_error().await;
            let (mut client_tx, _) = socket.split();
            let _ = client_tx
                .send(ws::Message::Close(Some(ws::CloseFrame {
                    code: u16::from(CloseCode::Error),
                    reason: "Upstream unavailable".into(),
                })))
                .await;
            return;
        }
    };

    tracing::info!("WebSocket relay opened for {}", path_and_query);
    state.metrics.relay_opened().await;

    let (mut client_tx, mut client_rx) = socket.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();
    let mut shutdown = state.shutdown_signal();

    loop {
        if *shutdown.borrow() {
            close_for_shutdown(&mut client_tx, &mut upstream_tx).await;
            break;
        }

        tokio::select! {
            message = client_rx.next() => {
                let Some(Ok(message)) = message else { break };
                capture_frame(&state, Direction::ClientToServer, &message).await;
                if upstream_tx.send(to_upstream(message)).await.is_err() {
                    break;
                }
            }
            message = upstream_rx.next() => {
                let Some(Ok(message)) = message else { break };
                let Some(message) = to_client(message) else { continue };
                capture_frame(&state, Direction::ServerToClient, &message).await;
                if client_tx.send(message).await.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => {
                close_for_shutdown(&mut client_tx, &mut upstream_tx).await;
                break;
            }
        }
    }

    let _ = client_tx.close().await;
    let _ = upstream_tx.close().await;

    state.metrics.relay_closed().await;
    tracing::info!("WebSocket relay closed for {}", path_and_query);
}

type UpstreamStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect_upstream(url: &str, headers: HeaderBag) -> Result<UpstreamStream, tungstenite::Error> {
    let mut request = url.into_client_request()?;
    let forwarded = headers.filter_for_request().to_header_map();
    for (name, value) in forwarded.iter() {
        if HANDSHAKE_HEADERS.contains(&name.as_str()) {
            continue;
        }
        request.headers_mut().append(name.clone(), value.clone());
    }

    let (stream, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

async fn close_for_shutdown<C, U>(client_tx: &mut C, upstream_tx: &mut U)
where
    C: Sink<ws::Message> + Unpin,
    U: Sink<tungstenite::Message> + Unpin,
{
    let _ = client_tx
        .send(ws::Message::Close(Some(ws::CloseFrame {
            code: constants::SHUTDOWN_CLOSE_CODE,
            reason: constants::SHUTDOWN_CLOSE_REASON.into(),
        })))
        .await;
    let _ = upstream_tx
        .send(tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::from(constants::SHUTDOWN_CLOSE_CODE),
            reason: constants::SHUTDOWN_CLOSE_REASON.into(),
        })))
        .await;
}

async fn capture_frame(state: &AppState, direction: Direction, message: &ws::Message) {
    let (payload, is_binary) = match message {
        ws::Message::Text(text) => (FramePayload::Text(text.as_str().to_string()), false),
        ws::Message::Binary(data) => (FramePayload::Binary(data.clone()), true),
        _ => return,
    };
    state.capture.log_websocket(direction, &payload, is_binary);
    state.metrics.record_frame(direction).await;
}

fn to_upstream(message: ws::Message) -> tungstenite::Message {
    match message {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|frame| CloseFrame {
            code: CloseCode::from(frame.code),
            reason: frame.reason.as_str().into(),
        })),
    }
}

/// Raw frames never surface from a client stream
fn to_client(message: tungstenite::Message) -> Option<ws::Message> {
    Some(match message {
        tungstenite::Message::Text(text) => ws::Message::Text(text.as_str().into()),
        tungstenite::Message::Binary(data) => ws::Message::Binary(data),
        tungstenite::Message::Ping(data) => ws::Message::Ping(data),
        tungstenite::Message::Pong(data) => ws::Message::Pong(data),
        tungstenite::Message::Close(frame) => ws::Message::Close(frame.map(|frame| ws::CloseFrame {
            code: u16::from(frame.code),
            reason: frame.reason.as_str().into(),
        })),
        tungstenite::Message::Frame(_) => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hub::SseSink;
    use crate::routes::app;
    use axum::routing::get;
    use axum::Router;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Upstream that echoes every data frame back
    async fn spawn_echo_upstream() -> String {
        async fn echo(mut socket: WebSocket) {
            while let Some(Ok(message)) = socket.recv().await {
                let reply = match message {
                    ws::Message::Text(_) | ws::Message::Binary(_) => message,
                    ws::Message::Close(_) => break,
                    _ => continue,
                };
                if socket.send(reply).await.is_err() {
                    break;
                }
            }
        }

        let router = Router::new().route(
            "/socket",
            get(|ws: WebSocketUpgrade| async move { ws.on_upgrade(echo) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_proxy(target: String) -> (AppState, String, mpsc::UnboundedReceiver<Bytes>) {
        let state = AppState::new(Config::for_target(target)).unwrap();
        let (sink, rx) = SseSink::new();
        state.hub.register(Arc::new(sink));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (state, format!("ws://{}", addr), rx)
    }

    async fn next_websocket_entry(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> serde_json::Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for broadcast")
                .expect("channel closed");
            let text = std::str::from_utf8(&frame).unwrap();
            let json: serde_json::Value =
                serde_json::from_str(text.trim_start_matches("data: ").trim_end()).unwrap();
            if json["type"] == "websocket" {
                return json;
            }
        }
    }

    #[tokio::test]
    async fn test_binary_frame_is_captured_with_length() {
        let target = spawn_echo_upstream().await;
        let (_state, proxy, mut rx) = spawn_proxy(target).await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("{}/socket", proxy))
            .await
            .unwrap();
        client
            .send(tungstenite::Message::Binary(Bytes::from(vec![0xAB; 42])))
            .await
            .unwrap();

        let outbound = next_websocket_entry(&mut rx).await;
        assert_eq!(outbound["data"]["body"], "◆◇[BINARY_DATA]◇◆");
        assert_eq!(outbound["data"]["byteLength"], 42);
        assert_eq!(outbound["data"]["isBinary"], true);
        assert_eq!(outbound["data"]["direction"], "client-to-server");
        assert_eq!(outbound["icon"], "🔌");

        let inbound = next_websocket_entry(&mut rx).await;
        assert_eq!(inbound["data"]["direction"], "server-to-client");
        assert_eq!(inbound["message"], "WebSocket ←: BINARY (42 bytes)");

        let echoed = client.next().await.unwrap().unwrap();
        assert_eq!(echoed.into_data().len(), 42);
    }

    #[tokio::test]
    async fn test_text_frames_are_relayed() {
        let target = spawn_echo_upstream().await;
        let (_state, proxy, mut rx) = spawn_proxy(target).await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("{}/socket", proxy))
            .await
            .unwrap();
        client
            .send(tungstenite::Message::Text("{\"op\":\"ping\"}".into()))
            .await
            .unwrap();

        let echoed = client.next().await.unwrap().unwrap();
        assert_eq!(echoed.into_text().unwrap().as_str(), "{\"op\":\"ping\"}");

        let outbound = next_websocket_entry(&mut rx).await;
        assert_eq!(outbound["data"]["body"], "{\"op\":\"ping\"}");
        assert_eq!(outbound["data"]["isBinary"], false);
        assert_eq!(outbound["data"]["byteLength"], 13);
    }

    #[tokio::test]
    async fn test_shutdown_closes_relay_with_going_away() {
        let target = spawn_echo_upstream().await;
        let (state, proxy, _rx) = spawn_proxy(target).await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("{}/socket", proxy))
            .await
            .unwrap();
        // Round trip once so the relay is fully established
        client
            .send(tungstenite::Message::Text("hello".into()))
            .await
            .unwrap();
        client.next().await.unwrap().unwrap();

        state.begin_shutdown();

        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match message {
            tungstenite::Message::Close(Some(frame)) => {
                assert_eq!(u16::from(frame.code), 1001);
                assert_eq!(frame.reason.as_str(), "Server Shutdown");
            }
            other => panic!("expected close frame, got {:?}", other),
        }
    }
}
