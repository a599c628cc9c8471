use std::io::{self, BufRead};
use std::net::IpAddr;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rtsp::{Client, ClientConfig, PlaybackCommand, RtspError, SessionState, TransportMode};
use tracing::Level;

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Udp,
    Tcp,
}

#[derive(Parser)]
#[command(
    name = "rtsp-client",
    about = "RTSP client: plays a stream and reports RTP loss"
)]
struct Args {
    /// Stream URL (rtsp://[user:pass@]host[:port]/path)
    url: String,

    /// Media transport: separate UDP socket or interleaved on the control connection
    #[arg(long, short, value_enum, default_value = "udp")]
    transport: Transport,

    /// First local RTP port to try (the client picks an even port in a 100-port window)
    #[arg(long, default_value_t = 10014)]
    client_port: u16,

    /// Explicit destination address for the Transport header
    #[arg(long)]
    dest_ip: Option<IpAddr>,

    /// Keep-alive interval in seconds
    #[arg(long, default_value_t = 10)]
    keepalive: u64,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_command(line: &str) -> Option<PlaybackCommand> {
    Some(match line.trim() {
        "play" | "p" => PlaybackCommand::Play {
            range: None,
            scale: None,
        },
        "pause" => PlaybackCommand::Pause,
        "forward" | "f" => PlaybackCommand::Forward,
        "backward" | "b" => PlaybackCommand::Backward,
        "begin" => PlaybackCommand::Begin,
        "live" => PlaybackCommand::Live,
        "teardown" | "exit" | "quit" | "q" => PlaybackCommand::Teardown,
        _ => return None,
    })
}

fn start(url: &str, config: ClientConfig) -> Result<Client, RtspError> {
    let mut client = Client::connect(url, config)?;
    let mut result = client.start();

    for _ in 0..MAX_REDIRECTS {
        if !matches!(result, Err(RtspError::RedirectRequested { .. })) {
            break;
        }
        client = client.follow_redirect()?;
        result = match client.redirect_target() {
            Some(location) => Err(RtspError::RedirectRequested { location }),
            None => Ok(()),
        };
    }

    result.map(|()| client)
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = ClientConfig {
        transport: match args.transport {
            Transport::Udp => TransportMode::Udp,
            Transport::Tcp => TransportMode::Interleaved,
        },
        client_ports: args.client_port..=args.client_port.saturating_add(99),
        destination: args.dest_ip,
        keepalive_interval: Duration::from_secs(args.keepalive),
        ..ClientConfig::default()
    };

    let mut client = match start(&args.url, config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to start session: {e}");
            std::process::exit(1);
        }
    };

    if let Some(frames) = client.take_frames() {
        thread::spawn(move || {
            for frame in frames {
                tracing::trace!(seq = frame.sequence, len = frame.payload.len(), "frame");
            }
        });
    }

    println!(
        "Playing {} (session {}). Commands: play pause forward backward begin live teardown",
        args.url,
        client.session_id().unwrap_or_default()
    );

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = parse_command(&line) else {
            eprintln!("Unknown command: {}", line.trim());
            continue;
        };
        if command == PlaybackCommand::Teardown {
            break;
        }
        if let Err(e) = client.command(command) {
            eprintln!("Command failed: {e}");
            if client.state() == SessionState::Closed {
                break;
            }
        }
    }

    match client.teardown() {
        Ok(report) => println!(
            "Session ended in {:?}: {} delivered, {} lost, {} late, loss rate {:.2}%",
            report.state,
            report.stats.delivered,
            report.stats.lost,
            report.stats.late,
            report.stats.loss_rate() * 100.0
        ),
        Err(e) => {
            let stats = client.stats();
            eprintln!(
                "Teardown failed: {e} ({} delivered, {} lost)",
                stats.delivered, stats.lost
            );
        }
    }
}
