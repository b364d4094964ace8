//! Logs in to a shard and prints every message it sends back, one JSON
//! object per line, until the shard closes or login completes.
//!
//! ```text
//! shard-login <host:port> <username> <password> [auth-id]
//! ```
//!
//! Set `SHARDLINK_CONFIG` to a JSON file to override client settings. The
//! address on the command line always wins.

use std::process::ExitCode;

use shardlink::prelude::*;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("shard_login=info,shardlink=info");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [addr, username, password, rest @ ..] = args.as_slice() else {
        eprintln!("usage: shard-login <host:port> <username> <password> [auth-id]");
        return ExitCode::from(2);
    };
    let auth_id = match rest.first().map(|s| s.parse::<u32>()) {
        None => 0,
        Some(Ok(id)) => id,
        Some(Err(e)) => {
            eprintln!("auth-id must be a 32-bit number: {e}");
            return ExitCode::from(2);
        }
    };

    match check_login(addr, username, password, auth_id).await {
        Ok(count) => {
            tracing::info!(count, "login check finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "login check failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(addr: &str) -> Result<ClientConfig, ShardlinkError> {
    let mut config = match std::env::var("SHARDLINK_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path).map_err(|e| {
                ShardlinkError::Config(format!("cannot read {path}: {e}"))
            })?;
            ClientConfig::from_json(&json)?
        }
        Err(_) => ClientConfig::default(),
    };
    config.server_addr = addr.to_string();
    Ok(config)
}

async fn check_login(
    addr: &str,
    username: &str,
    password: &str,
    auth_id: u32,
) -> Result<usize, ShardlinkError> {
    let mut client = ShardClient::builder()
        .config(load_config(addr)?)
        .connect()
        .await?;

    client.send(&GameLoginPacket::new(auth_id, username, password)).await?;

    let mut count = 0;
    while let Some(message) = client.next_message().await? {
        count += 1;
        match serde_json::to_string(&message) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "could not encode message"),
        }
        match message {
            ServerMessage::CharacterCityList(_) => {
                client.send(&RequestNoticePacket::new(0)).await?;
            }
            ServerMessage::LoginComplete(_) => break,
            _ => {}
        }
    }

    client.close().await?;
    Ok(count)
}
