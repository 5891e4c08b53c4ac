//! Array transfers, including chunking past the per-request limits.
//!
//! Usage: `cargo run --example arrays -- <plc-ip> [route-path]`

use eip_tags::{ClientConfig, TagClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let ip = args.next().unwrap_or_else(|| "192.168.1.10".to_string());
    let path = args.next().unwrap_or_else(|| "1,0".to_string());

    let client = TagClient::new(ClientConfig::new(ip).with_path(&path));

    // 500 elements: written in adaptive chunks, read back in chunks of 124.
    let curve: Vec<f32> = (0..500).map(|i| (i as f32 / 50.0).sin()).collect();
    client.write_float_array("Profile", &curve).await?;

    let back = client.read_float_array("Profile", curve.len()).await?;
    println!("read {} of {} elements", back.len(), curve.len());

    // Bit-packed view of an integer tag.
    let alarms = client.read_bool_array("i=AlarmWord[0]", 16).await?;
    let active = alarms.iter().filter(|a| **a).count();
    println!("{active} alarm bits set");

    client.close().await;
    Ok(())
}
