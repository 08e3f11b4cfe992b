mod allocator;
mod app;

use crate::app::App;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    App::init()?.execute().await
}
