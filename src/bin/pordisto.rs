use anyhow::Result;
use pordisto::cli;

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;

    let result = action.execute().await;

    // Flush pending spans before exiting
    cli::telemetry::shutdown_tracer();

    result
}
