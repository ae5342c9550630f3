//! Jad HTTP 服务
//!
//! 启动: cargo run --bin jad-server --features server
//! 监听地址取 [server].bind，可用 JAD__SERVER__BIND 覆盖

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jad::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let builder = jad::create_engine_builder(config_path);
    let bind = builder.config().server.bind.clone();
    let engine = Arc::new(builder.build().context("Failed to build decision engine")?);

    let app = jad::api::router(engine);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("Jad server: http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}
