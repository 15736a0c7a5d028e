//! Binary entrypoint for the serialterm CLI.
//!
//! Commands:
//! - `connect [--port <path>] [-b <baud>] [--hex] [--no-connect]` - open a port and run the interactive terminal
//! - `ports [--json]` - list serial devices
//! - `init` - write a starter `serialterm.toml`
//!
//! See the library crate docs for module-level details: `serialterm::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use serialterm::config::Config;
#[cfg(feature = "serial")]
use serialterm::dump::DisplayMode;

#[derive(Parser)]
#[command(name = "serialterm")]
#[command(about = "Interactive terminal for serial devices")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "serialterm.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a serial port and start the interactive terminal
    Connect {
        /// Serial device (e.g., /dev/ttyUSB0); overrides the config file
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate; overrides the config file
        #[arg(short = 'b', long)]
        baud: Option<u32>,

        /// Start in hex display mode
        #[arg(long)]
        hex: bool,

        /// Start the terminal without opening the port (use :connect later)
        #[arg(long)]
        no_connect: bool,
    },
    /// List available serial ports
    Ports {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
            println!("Wrote {}", cli.config);
        }
        Commands::Ports { json } => {
            let config = Config::load_or_default(&cli.config).await?;
            init_logging(&Some(config), cli.verbose);
            #[cfg(feature = "serial")]
            {
                let ports = serialterm::serial::list_ports()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&ports)?);
                } else if ports.is_empty() {
                    println!("No serial ports found");
                } else {
                    for p in ports {
                        println!("{}\t{}", p.port_name, p.port_type);
                    }
                }
            }
            #[cfg(not(feature = "serial"))]
            {
                let _ = json;
                eprintln!("Error: port enumeration requires the 'serial' feature.");
                std::process::exit(2);
            }
        }
        Commands::Connect {
            port,
            baud,
            hex,
            no_connect,
        } => {
            let mut config = Config::load_or_default(&cli.config).await?;
            // CLI overrides config
            if let Some(port) = port {
                config.serial.port = port;
            }
            if let Some(baud) = baud {
                config.serial.baud_rate = baud;
            }
            config.validate()?;
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting serialterm v{}", env!("CARGO_PKG_VERSION"));

            #[cfg(feature = "serial")]
            {
                use serialterm::serial::SystemPortOpener;
                use serialterm::terminal::Terminal;

                if hex {
                    config.terminal.display_mode = DisplayMode::Hex;
                }
                let mut term = Terminal::new(&config, SystemPortOpener, std::io::stdout());
                if config.terminal.connect_on_start && !no_connect {
                    term.connect(config.serial.port_config()).await?;
                }
                let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                term.run(stdin).await?;
            }
            #[cfg(not(feature = "serial"))]
            {
                let _ = (hex, no_connect);
                eprintln!("Error: serial support requires the 'serial' feature.");
                eprintln!("Compile with: cargo build --features serial");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Warn),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(file) = log_file {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            Ok(f) => {
                let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
                // Only mirror to the console when someone is watching it
                let is_tty = atty::is(atty::Stream::Stderr);

                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());

                    if let Ok(mut guard) = write_mutex.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }

                    if is_tty {
                        writeln!(fmt, "{}", line)
                    } else {
                        Ok(())
                    }
                });
            }
            Err(e) => {
                eprintln!("Cannot open log file {}: {} (logging to stderr)", file, e);
                builder.format(|fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
                });
            }
        }
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
