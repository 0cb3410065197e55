use std::env;
use std::io::{self, BufRead};

use home_connect::{
    Bridge, BridgeConfig, HomeConnectClientBuilder, MemoryPublisher, MessageLogMode, Normalizer,
};

#[tokio::main]
async fn main() -> home_connect::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let config_path = args
        .get(1)
        .expect("usage: discover <config.json> [--log <path>]");
    let log_path = args
        .iter()
        .position(|a| a == "--log")
        .and_then(|i| args.get(i + 1));

    let config = BridgeConfig::from_file(config_path)?;
    let mut builder = HomeConnectClientBuilder::from_config(&config).on_status(|status| {
        println!("status: {status:?} ({})", status.code());
    });
    if let Some(path) = log_path {
        println!("Logging requests/responses to {path}");
        builder = builder.message_log(MessageLogMode::Redacted, path);
    }

    let publisher = MemoryPublisher::new();
    let mut bridge = Bridge::new(builder.build()?, Normalizer::default(), publisher.clone());

    if !bridge.client().token_manager().is_authorized() {
        let url = bridge
            .authorization_url()
            .expect("authorization url should build");
        println!("Open this URL and paste the redirect query (code=...&state=...):");
        println!("{url}");

        let mut query = String::new();
        io::stdin().lock().read_line(&mut query)?;
        if !bridge.handle_redirect(query.trim()).await {
            println!("Login failed: {}", bridge.last_error().unwrap_or("unknown error"));
            return Ok(());
        }
    }

    let count = bridge.create_devices().await;
    println!(
        "{} (category {})",
        bridge.devices_found_message(count),
        config.category_id
    );

    for appliance in bridge.appliances() {
        println!("\n{} {} [{}]", appliance.brand, appliance.name, appliance.id);
        for setting in &appliance.settings {
            match setting.value {
                Some(ref value) => println!("  {:<32} {value}", setting.key),
                None => println!("  {:<32} -", setting.key),
            }
        }
    }
    Ok(())
}
