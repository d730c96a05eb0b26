//! Example client creating a sandbox payment
//!
//! Reads credentials from `PAYSSION_API_KEY` / `PAYSSION_API_SECRET` and
//! dumps the raw exchange to stdout.

use payssion::{ClientConfig, DebugSink, PaymentFields, PayssionClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = ClientConfig::from_env()?.with_debug_sink(DebugSink::stdout());
    let client = PayssionClient::with_config(config)?;
    println!("Sending to {}", client.api_host());

    let mut fields = PaymentFields::new()
        .with("pm_id", "alipay_cn")
        .with("amount", "1")
        .with("currency", "CNY")
        .with("description", "")
        .with("order_id", "test00000002")
        .with("return_url", "https://www.example.com/return");

    match client.create(&mut fields).await {
        Ok(result) if result.is_success() => {
            println!("Payment created");
            println!("  Transaction: {}", result.transaction_id().unwrap_or("-"));
            println!("  Redirect:    {}", result.redirect_url);
        }
        Ok(result) => {
            println!("Gateway rejected the payment: result_code {}", result.result_code);
        }
        Err(e) => {
            eprintln!("Create failed: {}", e);
        }
    }

    Ok(())
}
