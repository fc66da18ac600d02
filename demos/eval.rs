//! Evaluate one expression on an Rserve server and print the result.
//!
//! ```text
//! cargo run --example eval -- "summary(c(1, 2, 3, NA))"
//! RSERVE_CONFIG=rserve.json cargo run --example eval -- "R.version.string"
//! ```

use rserve_client::{ConnectionBuilder, ConnectionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let expr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "R.version.string".to_owned());

    let config = match std::env::var("RSERVE_CONFIG") {
        Ok(path) => ConnectionConfig::from_json(&std::fs::read_to_string(path)?)?,
        Err(_) => ConnectionConfig::default(),
    };

    let mut conn = ConnectionBuilder::from_config(config).connect().await?;
    println!(
        "server: {}",
        serde_json::to_string_pretty(conn.server_info())?
    );

    let value = conn.eval(&expr).await?;
    println!("{expr} => {value}");
    println!("as JSON: {}", value.to_native());

    conn.close().await?;
    Ok(())
}
