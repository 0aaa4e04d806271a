//! Roomlink command line client

use crate::room::{Room, RoomPhase};
use crate::RoomError;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use roomlink_network::{TransportConfig, TransportEvent, WebSocketTransport};
use roomlink_state::Value;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Roomlink client - join a room and follow its state")]
struct Args {
    /// WebSocket URL of the room endpoint
    url: String,

    /// Room name
    #[arg(short, long, default_value = "lobby")]
    room: String,

    /// Room id, when it was assigned before connecting
    #[arg(long)]
    room_id: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Print state and data as JSON
    #[arg(long)]
    json: bool,

    /// Only follow the room, do not read data to send from stdin
    #[arg(long)]
    listen: bool,
}

/// Feed transport events into `room` until it leaves or the transport goes away
pub async fn drive(
    room: &mut Room,
    events: &mut mpsc::Receiver<TransportEvent>,
) -> Result<(), RoomError> {
    while let Some(event) = events.recv().await {
        room.handle_event(event)?;
        if room.phase() == RoomPhase::Left {
            break;
        }
    }
    Ok(())
}

/// Like [`drive`], also sending each input line to the room.
///
/// A line of `/leave` leaves the room. Closing the input leaves as well.
pub async fn interact(
    room: &mut Room,
    events: &mut mpsc::Receiver<TransportEvent>,
    mut input: mpsc::Receiver<String>,
) -> Result<(), RoomError> {
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    room.handle_event(event)?;
                    if room.phase() == RoomPhase::Left {
                        break;
                    }
                }
                None => break,
            },
            line = input.recv(), if input_open => match line {
                Some(line) => send_line(room, &line)?,
                None => {
                    debug!("Input closed");
                    input_open = false;
                    room.leave();
                }
            },
        }
    }

    Ok(())
}

fn send_line(room: &mut Room, line: &str) -> Result<(), RoomError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    if line == "/leave" {
        room.leave();
        return Ok(());
    }
    room.send(parse_input(line))
}

/// JSON becomes structured data; anything else is sent as a string
fn parse_input(line: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|json| rmpv::ext::to_value(json).ok())
        .unwrap_or_else(|| Value::from(line))
}

fn render(value: &Value, json: bool) -> String {
    if json {
        if let Ok(json) = rmpv::ext::from_value::<serde_json::Value>(value.clone()) {
            return json.to_string();
        }
    }
    value.to_string()
}

fn parse_room_id(raw: &str) -> Value {
    match raw.parse::<u64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(raw),
    }
}

fn print_events(room: &mut Room, json: bool) {
    let name = room.name().to_string();
    room.on_join().add(move |_| println!("joined {name}"));
    room.on_update()
        .add(move |state| println!("state {}", render(state, json)));
    room.on_data()
        .add(move |data| println!("data {}", render(data, json)));
    room.on_error()
        .add(move |error| eprintln!("error {}", render(error, json)));
    room.on_leave().add(|_| println!("left"));
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn run() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level {
        LogLevel::Trace => tracing::Level::TRACE,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = TransportConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout),
        ..TransportConfig::default()
    };

    info!("Connecting to {}", args.url);
    let (transport, mut events) = WebSocketTransport::connect(&args.url, config)
        .await
        .with_context(|| format!("Failed to connect to {}", args.url))?;

    let mut room = Room::new(args.room.clone());
    if let Some(raw) = &args.room_id {
        room.set_id(parse_room_id(raw));
    }
    print_events(&mut room, args.json);
    room.connect(transport)?;

    if args.listen {
        drive(&mut room, &mut events).await?;
    } else {
        interact(&mut room, &mut events, spawn_stdin_reader()).await?;
    }

    info!("Room {} closed", args.room);
    Ok(())
}
