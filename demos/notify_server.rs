//! Example Axum server receiving payment notifications

use payssion::{axum::notification_router, InboundNotification, NotificationVerifier};
use std::convert::Infallible;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("PAYSSION_API_KEY")?;
    let api_secret = std::env::var("PAYSSION_API_SECRET")?;
    let verifier = NotificationVerifier::new(api_key, api_secret);

    let app = notification_router("/payssion/notify", verifier, on_notification);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:4021").await?;
    println!("Listening on http://0.0.0.0:4021");
    println!("   POST /payssion/notify - Payment notifications");

    axum::serve(listener, app).await?;

    Ok(())
}

fn on_notification(notification: &InboundNotification) -> Result<(), Infallible> {
    println!(
        "Order {} is now {} ({} {})",
        notification.order_id, notification.state, notification.amount, notification.currency
    );
    Ok(())
}
