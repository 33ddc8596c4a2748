//! Standalone dummy origin for manual exploration against a locally running
//! `retter` binary. Listens on `127.0.0.1:8088` by default (retter's
//! `backend.baseurl` default) and prints the endpoints it understands.

use retter_testsupport::DummyOrigin;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8088".to_string());

    let origin = DummyOrigin::new();
    tracing::info!(%addr, "dummy origin listening");
    tracing::info!("reconfigure with: curl 'http://{addr}/set?f=0&s=1&e=0.5'");

    let listener = TcpListener::bind(&addr)
        .await
        .expect("failed to bind dummy origin listen address");
    axum::serve(listener, origin.router())
        .await
        .expect("dummy origin server error");
}
