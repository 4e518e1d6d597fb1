// GET /ws: one websocket is one relay connection

use futures_util::{SinkExt, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, warn};
use warp::ws::{Message, WebSocket};

use crate::relay::Gateway;

pub async fn run_socket(socket: WebSocket, gateway: Gateway) {
    let (mut sink, mut inbound) = socket.split();
    let (connection, outbound) = gateway.connect();

    // Ends when the gateway drops the connection's sender (disconnect or eviction)
    let mut outbound = ReceiverStream::new(outbound);
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.next().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(connection_id = %connection, error = %e, "failed to encode event");
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::text(frame)).await {
                debug!(connection_id = %connection, error = %e, "socket write failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(result) = inbound.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                debug!(connection_id = %connection, error = %e, "socket read failed");
                break;
            }
        };
        if message.is_close() {
            break;
        }
        if message.is_ping() || message.is_pong() {
            continue;
        }
        let Ok(frame) = message.to_str() else {
            warn!(connection_id = %connection, "ignoring non-text frame");
            continue;
        };
        // Rejections are logged by the gateway; the socket stays open
        let _ = gateway.dispatch(connection, frame).await;
    }

    gateway.disconnect(connection).await;
    let _ = writer.await;
}
