use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info};
use warble::init_tracing;

mod api;
mod auth;
mod config;
mod directory;
mod domain;
mod presence;
mod router;
mod server;
mod service;
mod storage;
mod tasks;
mod ws;

pub use crate::server::RelayServer;

/// 命令行参数 / Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "warble-relay WebSocket & HTTP chat relay", long_about = None)]
pub struct Args {
    /// 指定配置文件路径 / Specify config file path
    #[arg(short = 'c', long = "config", default_value = "config/default.toml")]
    config: String,
}

async fn start_http_server(server: Arc<RelayServer>, host: String, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .wrap(
                actix_web::middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*"))
                    .add((
                        "Access-Control-Allow-Methods",
                        "GET, POST, PUT, DELETE, OPTIONS",
                    )),
            )
            .app_data(web::Data::new(server.clone()))
            .configure(crate::router::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 先配置后日志，日志级别来自配置 / Config before logging, the log
    // level comes from configuration
    warble::init_global_config_with_file(&args.config)?;
    init_tracing();

    info!("🎯 Starting warble-relay (WebSocket + HTTP)...");
    info!("🔧 Loaded config file: {}", args.config);

    let cm = warble::get_global_config_manager()?;
    cm.print_sources_info();

    let (server_config, history_config, auth_config) = config::load()?;

    info!("");
    info!("📖 WebSocket events:");
    info!("   - register: Bind a userId to this connection");
    info!("   - joinRoom: Join a group room and receive its history");
    info!("   - newMessage: Send a direct or group message");
    info!("   - fetchMessages: Page through stored messages");
    info!("   - typing: Forward a typing indicator");
    info!("   - messageRead: Record a read receipt");
    info!("   - editMessage / deleteMessage: Modify own messages");
    info!("   - getUserDataWithMessages: Conversation overview");
    info!("   - ping: Heartbeat (with automatic heartbeat tracking)");
    info!("");
    info!("💡 WebSocket examples:");
    info!("   Register: {{\"type\":\"register\",\"data\":{{\"userId\":\"alice\"}}}}");
    info!("   Message: {{\"type\":\"newMessage\",\"data\":{{\"senderId\":\"alice\",\"receiverId\":\"bob\",\"content\":\"Hello\"}}}}");
    info!("   Join room: {{\"type\":\"joinRoom\",\"data\":{{\"groupId\":\"g1\"}}}}");
    info!("   Ping: {{\"type\":\"ping\",\"data\":{{}}}}");

    // 单机部署装配内存实现 / Single-node deployment wires the in-memory implementations
    let mut server_builder = RelayServer::new()
        .with_store(Arc::new(storage::memory::MemoryMessageStore::new()))
        .with_groups(Arc::new(directory::MemoryGroupDirectory::new()))
        .with_users(Arc::new(directory::MemoryUserDirectory::new()))
        .with_history(history_config);
    if auth_config.enabled {
        info!("🔐 Registration requires a token");
        server_builder = server_builder.with_auth(Arc::new(auth::RequireTokenVerifier::new(
            auth_config.shared_secret.clone(),
        )));
    } else {
        info!("🔓 Registration is open (no token verification)");
    }
    let server = Arc::new(server_builder);

    // 启动自动心跳清理任务 / Start automatic heartbeat cleanup task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tasks::heartbeat::spawn_cleanup_task(server.clone(), server_config.timeout_ms, shutdown_rx);

    // 启动WebSocket服务器 / Start WebSocket server
    let ws_server = server.clone();
    let ws_host = server_config.host.clone();
    let ws_port = server_config.ws_port;
    let ws_future = async move {
        info!("🚀 Starting WebSocket server on {}:{}", ws_host, ws_port);
        if let Err(e) = ws_server.run(ws_host, ws_port).await {
            error!("❌ WebSocket server error: {}", e);
        }
    };

    // 启动HTTP服务器 / Start HTTP server
    let http_server = server.clone();
    let http_host = server_config.host.clone();
    let http_port = server_config.http_port;
    let http_future = async move {
        // 等待WebSocket服务器启动 / Wait for WebSocket server to start
        sleep(Duration::from_secs(1)).await;
        info!("🌐 Starting HTTP server on {}:{}", http_host, http_port);
        if let Err(e) = start_http_server(http_server, http_host, http_port).await {
            error!("❌ HTTP server error: {}", e);
        }
    };

    // 等待两个服务器运行 / Wait for both servers to run
    tokio::select! {
        _ = ws_future => {
            info!("WebSocket server stopped");
        }
        _ = http_future => {
            info!("HTTP server stopped");
        }
    }

    let _ = shutdown_tx.send(true);
    info!("✅ Server shutdown successfully");

    Ok(())
}
