//! Payments Point service entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    payments_point::server::run().await
}
