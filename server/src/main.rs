use clap::Parser;
use log::info;
use server::content;
use server::dispatch::Dispatcher;
use server::net;
use std::time::Duration;
use tokio::net::TcpListener;

/// Parses command-line arguments, seeds the world, then runs the network
/// edge and the dispatcher until one of them stops or Ctrl+C arrives.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value = "8080")]
        port: u16,
        /// Action drain interval in milliseconds
        #[clap(long, default_value = "50")]
        tick_ms: u64,
        /// NPC behavior pulse interval in milliseconds
        #[clap(long, default_value = "500")]
        npc_tick_ms: u64,
        /// Maximum concurrent connections
        #[clap(short, long, default_value = "64")]
        max_clients: usize,
    }

    env_logger::init();
    let args = Args::parse();

    let world = content::default_world();
    let dispatcher = Dispatcher::new(world, args.max_clients);
    let queue = dispatcher.handle();

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&address).await?;
    info!("listening on {address}");

    let net_handle = tokio::spawn(net::serve(listener, queue));
    let game_handle = tokio::spawn(dispatcher.run(
        Duration::from_millis(args.tick_ms),
        Duration::from_millis(args.npc_tick_ms),
    ));

    tokio::select! {
        result = net_handle => {
            if let Err(e) = result {
                eprintln!("network task panicked: {e}");
            }
        }
        result = game_handle => {
            if let Err(e) = result {
                eprintln!("dispatcher task panicked: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
