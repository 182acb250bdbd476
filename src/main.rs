#[tokio::main]
async fn main() -> anyhow::Result<()> {
    focuslog_lib::run().await
}
