//! Symbol search probe.
//!
//! Connects to TWS/Gateway, asks for contracts matching a pattern, prints
//! one line per match (or a timeout notice), then any queued errors.

use clap::Parser;

use tws_bridge::models::describe_contract;
use tws_bridge::{BridgeError, GatewayArgs, Response, Session};

/// Search IB contracts by symbol or description.
#[derive(Parser, Debug)]
#[command(name = "req-matching-symbols", version)]
struct Args {
    #[command(flatten)]
    gateway: GatewayArgs,

    /// Symbol or company-name fragment to search for
    #[arg(long, default_value = "SPY")]
    pattern: String,
}

fn main() -> Result<(), BridgeError> {
    tws_bridge::init_logging();
    let args = Args::parse();

    let session = match Session::connect(&args.gateway.session_config()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!(
                "Failed to connect to IB TWS/Gateway at {}:{} (client ID: {})",
                args.gateway.host, args.gateway.port, args.gateway.client_id
            );
            eprintln!("  Error: {e}");
            std::process::exit(1);
        }
    };

    match session.matching_symbols(&args.pattern, args.gateway.timeout()) {
        Ok(Response::Received(descriptions)) => {
            for cd in &descriptions {
                println!("{}", describe_contract(cd));
            }
        }
        Ok(Response::Exceeded) => println!("Exceeded maximum wait for wrapper to respond"),
        Err(e) => eprintln!("Symbol search failed: {e}"),
    }

    for error in session.drain_errors() {
        println!("{error}");
    }

    session.disconnect()
}
