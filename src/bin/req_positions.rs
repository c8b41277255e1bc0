//! Positions probe.
//!
//! Connects to TWS/Gateway, collects the positions snapshot for every
//! account, prints one line per position, then any queued errors.

use clap::Parser;

use tws_bridge::{BridgeError, GatewayArgs, Session};

/// Print current positions of all managed accounts.
#[derive(Parser, Debug)]
#[command(name = "req-positions", version)]
struct Args {
    #[command(flatten)]
    gateway: GatewayArgs,
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

    match session.positions(args.gateway.timeout()) {
        Ok(drained) => {
            for position in &drained.records {
                println!("{position}");
            }
            if !drained.completed {
                println!("Exceeded maximum wait for wrapper to respond");
            }
        }
        Err(e) => eprintln!("Positions request failed: {e}"),
    }

    for error in session.drain_errors() {
        println!("{error}");
    }

    session.disconnect()
}
