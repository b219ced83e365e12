#[tokio::main]
async fn main() -> anyhow::Result<()> {
    media_recorder_lib::init_tracing();
    media_recorder_lib::run().await
}
