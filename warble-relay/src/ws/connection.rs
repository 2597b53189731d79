use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info};
use uuid::Uuid;

use crate::server::{Connection, RelayServer};

/// 处理新连接 / Handle new connection
///
/// 连接的完整生命周期：握手、收发任务、逐条分发、断开清理。
/// The full connection lifecycle: handshake, send task, per-frame
/// dispatch and disconnect cleanup.
pub async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    server: RelayServer,
) -> Result<()> {
    info!("📨 New connection from: {}", peer_addr);

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // 创建通道用于向该连接发送消息 / Channel for outbound frames to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // 生成唯一连接ID / Generate unique connection ID
    let connection_id = Uuid::new_v4().to_string();

    // 启动消息发送任务 / Start the send task
    let connection_id_clone = connection_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(&msg, Message::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                error!("Failed to send message to {}: {}", connection_id_clone, e);
                break;
            }
            if is_close {
                let _ = ws_sender.close().await;
                break;
            }
        }
    });

    // 存储连接 / Store the connection
    let connection = Connection {
        connection_id: connection_id.clone(),
        uid: None,
        addr: peer_addr,
        sender: tx,
        last_heartbeat: Arc::new(std::sync::Mutex::new(std::time::Instant::now())),
    };
    server.connections.insert(connection_id.clone(), connection);

    info!("✅ Connection {} established from {}", connection_id, peer_addr);

    // 处理来自该连接的消息 / Handle frames from this connection
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(message) => {
                if let Err(e) = server.handle_incoming_message(message, &connection_id).await {
                    error!("Error handling message from {}: {}", connection_id, e);
                }
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", connection_id, e);
                break;
            }
        }
    }

    // 清理：断开即下线并退出所有房间 / Cleanup: disconnect leaves presence and all rooms
    server.connections.remove(&connection_id);
    send_task.abort();
    server.presence.unregister(&connection_id);
    server.leave_all_rooms(&connection_id);
    info!("👋 Connection {} disconnected", connection_id);

    Ok(())
}
