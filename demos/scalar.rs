//! Scalar reads and writes against a live controller.
//!
//! Usage: `cargo run --example scalar -- <plc-ip> [route-path]`

use eip_tags::{ClientConfig, TagClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let ip = args.next().unwrap_or_else(|| "192.168.1.10".to_string());
    let path = args.next().unwrap_or_else(|| "1,0".to_string());

    let client = TagClient::new(ClientConfig::new(ip).with_path(&path));

    client.write_float("SetPoint", 72.5).await?;
    println!("SetPoint = {}", client.read_float("SetPoint").await?);

    client.write_dint("BatchCount", 42).await?;
    println!("BatchCount = {}", client.read_dint("BatchCount").await?);

    client.write_bool("RunCmd", true).await?;
    client.write_bool("StatusWord[3]", true).await?;

    client.write_string("Operator", "shift A").await?;
    println!("Operator = {:?}", client.read_string("Operator").await?);

    client.close().await;
    Ok(())
}
