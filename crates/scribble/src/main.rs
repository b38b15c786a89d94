use scribble::{ScribbleError, ServerConfig, ScribbleServerBuilder};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ScribbleError> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scribble=info")),
        )
        .init();

    let server = ScribbleServerBuilder::from_config(config).build().await?;
    let admin = server.admin();

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            admin.shutdown("The server is restarting. Please reconnect in a moment.").await;
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
