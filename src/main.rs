use chrono::Local;
use koinonia_chat::http::ReqwestHttpClient;
use koinonia_chat::transport::WebSocketTransportFactory;
use koinonia_chat::types::channel::Channel;
use koinonia_chat::{Client, ClientConfig};
use log::{error, info};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

// A terminal chat for one channel, wired against a real backend.
//
// Usage:
//   cargo run -- --channel community:main
//   cargo run -- -c subgroup:youth
//
// The backend and session are taken from the environment:
//   KOINONIA_API_URL, KOINONIA_PUBSUB_URL, KOINONIA_TENANT,
//   KOINONIA_TOKEN, KOINONIA_MEMBER, KOINONIA_NAME

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let channel = parse_arg(&args, "--channel", "-c")
        .unwrap_or_else(|| "community:main".to_string());
    let channel: Channel = match channel.parse() {
        Ok(channel) => channel,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{:<5}] [{}] - {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();

    let defaults = ClientConfig::default();
    let config = ClientConfig {
        api_base_url: env_or("KOINONIA_API_URL", &defaults.api_base_url),
        pubsub_url: env_or("KOINONIA_PUBSUB_URL", &defaults.pubsub_url),
        tenant_id: env_or("KOINONIA_TENANT", &defaults.tenant_id),
        auth_token: env_or("KOINONIA_TOKEN", ""),
        member_id: env_or("KOINONIA_MEMBER", ""),
        display_name: env_or("KOINONIA_NAME", "Anonymous"),
        ..defaults
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime");

    rt.block_on(async {
        let transport_factory = Arc::new(WebSocketTransportFactory::new(config.pubsub_url.clone()));
        let client = Client::new(config, Arc::new(ReqwestHttpClient::new()), transport_factory);

        if let Err(e) = client.connect().await {
            error!("Failed to connect: {e}");
            return;
        }
        if let Err(e) = client.open_channel(&channel).await {
            error!("Failed to open {channel}: {e}");
            return;
        }
        match client.load_newest(&channel).await {
            Ok(count) => info!("Loaded {count} messages from {channel}"),
            Err(e) => error!("History fetch failed: {e}"),
        }

        spawn_event_printer(client.clone(), channel.clone());

        info!("Type to send, /older for history, /quit to leave.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            match line {
                "" => continue,
                "/quit" => break,
                "/older" => match client.load_older(&channel).await {
                    Ok(count) => info!("Loaded {count} older messages"),
                    Err(e) => error!("History fetch failed: {e}"),
                },
                text => {
                    if let Err(e) = client.send_text_message(channel.clone(), text).await {
                        error!("Send failed (bubble kept for resend): {e}");
                    }
                }
            }
        }

        client.close_channel(&channel).await;
        client.disconnect().await;
    });
}

fn spawn_event_printer(client: Arc<Client>, channel: Channel) {
    let mut added = client.events().message_added.subscribe();
    let mut presence = client.events().chat_presence.subscribe();
    let mut disconnected = client.events().disconnected.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(message) = added.recv() => {
                    if message.channel != channel {
                        continue;
                    }
                    match message.body.as_text() {
                        Some(text) => info!("<{}> {}", message.sender_name, text),
                        None => info!("<{}> [attachment]", message.sender_name),
                    }
                    // Reading the feed live means we are at top-of-feed.
                    if let Err(e) = client.mark_visible_read(&channel).await {
                        error!("Read receipt failed: {e}");
                    }
                }
                Ok(update) = presence.recv() => {
                    if update.channel == channel
                        && let Some(summary) = client.typing_summary(&channel)
                    {
                        info!("{summary}");
                    }
                }
                Ok(_) = disconnected.recv() => {
                    error!("Connection to broker lost; messages will still send over HTTP.");
                }
                else => break,
            }
        }
    });
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a CLI argument by its long and short flags.
/// Supports: --flag VALUE, -f VALUE, --flag=VALUE
fn parse_arg(args: &[String], long: &str, short: &str) -> Option<String> {
    let long_prefix = format!("{}=", long);
    let mut iter = args.iter().skip(1); // Skip program name
    while let Some(arg) = iter.next() {
        if arg == long || arg == short {
            return iter.next().cloned();
        }
        if let Some(value) = arg.strip_prefix(&long_prefix) {
            return Some(value.to_string());
        }
    }
    None
}
