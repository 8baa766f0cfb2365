#[tokio::main]
async fn main() -> anyhow::Result<()> {
    multipool_app::run().await
}
