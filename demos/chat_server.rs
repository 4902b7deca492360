//! Chat broker demo
//!
//! Run with: cargo run --example chat_server [PAR_PORT] [OBS_PORT]
//!
//! Examples:
//!   cargo run --example chat_server              # listens on 4000 / 4001
//!   cargo run --example chat_server 5000 5001    # custom ports
//!
//! Participants connect to PAR_PORT, observers to OBS_PORT. Wire protocol:
//! one handshake byte (Y/N), then length-prefixed frames; see the crate
//! docs for the exact framing.

use std::net::SocketAddr;

use chatcast::{ChatServer, ServerConfig};

fn parse_port(arg: &str) -> Result<u16, String> {
    arg.parse::<u16>()
        .map_err(|_| format!("Invalid port: '{}'", arg))
}

fn print_usage() {
    eprintln!("Usage: chat_server [PAR_PORT] [OBS_PORT]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  PAR_PORT    Participant listen port (default: 4000)");
    eprintln!("  OBS_PORT    Observer listen port (default: 4001)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let par_port = match args.get(1) {
        Some(arg) => match parse_port(arg) {
            Ok(port) => port,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => 4000,
    };
    let obs_port = match args.get(2) {
        Some(arg) => match parse_port(arg) {
            Ok(port) => port,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => par_port + 1,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chatcast=debug".parse()?)
                .add_directive("chat_server=debug".parse()?),
        )
        .init();

    let participant_addr: SocketAddr = ([0, 0, 0, 0], par_port).into();
    let observer_addr: SocketAddr = ([0, 0, 0, 0], obs_port).into();
    let config = ServerConfig::with_addrs(participant_addr, observer_addr);

    let server = ChatServer::bind(config).await?;
    println!(
        "Chat broker up: participants on {}, observers on {}",
        server.participant_addr()?,
        server.observer_addr()?
    );

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    let stats = server.stats();
    println!(
        "Session totals: {} connections, {} registrations, {} attaches, {} public, {} private, {} frames out",
        stats.connections_accepted,
        stats.registrations,
        stats.attaches,
        stats.public_messages,
        stats.private_messages,
        stats.frames_delivered,
    );

    Ok(())
}
