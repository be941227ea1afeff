//! # SWT Bridge for IPbus targets
//!
//! Serves SWT command sequences over TCP and executes them on an IPbus 2.0 target
//! reached over UDP, or on a simulated register file for dry runs.
mod backends;

use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use clap_num::number_range;
use env_logger::Env;
use swt_bridge::{
    Transport,
    packet::{LARGEST_TRANSACTION_SIZE, MAX_PACKET_SIZE, PACKET_SIZE_PADDING, PacketLimits},
    server::{Config, Server},
};
use swt_protocol::message::DEFAULT_MAX_MESSAGE_LEN;

use crate::backends::{ipbus::IpbusBackend, simulated::SimulatedBackend};

const DEFAULT_IPBUS_PORT: u16 = 50001;
fn packet_size(s: &str) -> Result<usize, String> {
    number_range(s, 2 * LARGEST_TRANSACTION_SIZE, MAX_PACKET_SIZE)
}

fn packet_padding(s: &str) -> Result<usize, String> {
    number_range(s, LARGEST_TRANSACTION_SIZE, MAX_PACKET_SIZE - 2)
}

fn timeout_ms(s: &str) -> Result<u64, String> {
    number_range(s, 1, 60_000)
}

#[derive(Parser, Eq, PartialEq, Clone)]
enum Backend {
    /// Execute on an IPbus target over UDP
    Ipbus {
        target: IpAddr,
        #[arg(long, default_value_t = DEFAULT_IPBUS_PORT)]
        target_port: u16,
        #[arg(short, long, help = "The local UDP port, 0 picks any", default_value = "0")]
        local_port: u16,
        #[arg(
            short,
            long,
            help = "The reply timeout in milliseconds",
            default_value = "1000",
            value_parser = timeout_ms
        )]
        timeout_ms: u64,
    },
    /// Execute on an in-memory register file
    Simulated,
}

#[derive(Parser)]
#[command(about = "SWT command bridge for IPbus front-end electronics", long_about=None)]
struct Args {
    #[arg(short, long, default_value = "5000")]
    port: u16,

    #[arg(short, long, default_value = "127.0.0.1")]
    ip: IpAddr,

    #[arg(long, help = "Packet size bound in 32-bit words", default_value_t = MAX_PACKET_SIZE, value_parser = packet_size)]
    max_packet_size: usize,

    #[arg(long, help = "Words kept free in every packet", default_value_t = PACKET_SIZE_PADDING, value_parser = packet_padding)]
    packet_padding: usize,

    #[arg(long, help = "Longest accepted request in bytes", default_value_t = DEFAULT_MAX_MESSAGE_LEN)]
    max_request_len: usize,

    #[clap(subcommand)]
    backend: Backend,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("Starting SWT bridge");

    let args = Args::parse();
    log::debug!("Parsed arguments: ip={}, port={}", args.ip, args.port);

    let config = Config {
        max_request_len: args.max_request_len,
        limits: PacketLimits::new(args.max_packet_size, args.packet_padding)?,
    };
    log::debug!("Server config: {:?}", config);

    let transport: Box<dyn Transport + Send + Sync> = match args.backend {
        Backend::Ipbus {
            target,
            target_port,
            local_port,
            timeout_ms,
        } => {
            let backend = IpbusBackend::new(
                SocketAddr::new(target, target_port),
                local_port,
                Duration::from_millis(timeout_ms),
            )?;
            log::info!("Initializing IPbus backend for {}", backend.target());
            Box::new(backend)
        }
        Backend::Simulated => {
            log::info!("Initializing simulated backend");
            Box::new(SimulatedBackend::new())
        }
    };

    let addr = SocketAddr::new(args.ip, args.port);
    log::info!("Binding to address: {}", addr);
    let server = Server::new(transport, config);

    tokio::select! {
        result = server.listen(addr) => result?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutting down"),
    }
    Ok(())
}
