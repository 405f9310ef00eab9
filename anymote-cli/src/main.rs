mod config;

use anyhow::{anyhow, bail, Context, Result};
use anymote_protocol::pairing::{PairingSession, DEFAULT_SERVICE_NAME};
use anymote_protocol::{
    CertificateInfo, CommandSession, KeyAction, Keycode, ProtocolError, TlsConnection,
    TransportConfig,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use config::Config;

/// Pair with and remote-control an Anymote device
#[derive(Debug, Parser)]
#[command(name = "anymote", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Device host name or address
    #[arg(long, global = true)]
    host: Option<String>,

    /// Combined PEM file with the client certificate and key
    #[arg(long, global = true)]
    cert: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pair this client's certificate with the device
    Pair {
        #[arg(long)]
        port: Option<u16>,

        /// Name shown on the device
        #[arg(long)]
        client_name: Option<String>,
    },

    /// Open a URI on the device
    Fling {
        #[arg(long)]
        port: Option<u16>,

        uri: String,
    },

    /// Send keys: `HOME` presses, `HOME:d` / `HOME:u` send a single down / up
    Keys {
        #[arg(long)]
        port: Option<u16>,

        #[arg(required = true)]
        keys: Vec<KeySpec>,
    },

    /// Move the pointer by a relative offset
    #[command(allow_negative_numbers = true)]
    Mouse {
        #[arg(long)]
        port: Option<u16>,

        #[arg(default_value_t = 0)]
        dx: i32,

        #[arg(default_value_t = 0)]
        dy: i32,
    },

    /// Scroll horizontally and vertically
    #[command(allow_negative_numbers = true)]
    Scroll {
        #[arg(long)]
        port: Option<u16>,

        x: i32,

        y: i32,
    },
}

/// One `keys` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeySpec {
    keycode: Keycode,
    /// `None` presses the key
    action: Option<KeyAction>,
}

impl FromStr for KeySpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, direction) = match s.split_once(':') {
            Some((name, direction)) => (name, Some(direction)),
            None => (s, None),
        };

        let keycode = name.parse::<Keycode>().map_err(|e| e.to_string())?;
        let action = direction
            .map(|d| d.parse::<KeyAction>().map_err(|e| e.to_string()))
            .transpose()?;

        Ok(Self { keycode, action })
    }
}

/// Settings after applying command-line overrides
struct Target {
    config: Config,
    host: String,
    cert_path: PathBuf,
}

impl Target {
    fn new(cli: &Cli, config: Config) -> Result<Self> {
        let host = cli
            .host
            .clone()
            .or_else(|| config.device.host.clone())
            .context("No device host; pass --host or set device.host in the config file")?;
        let cert_path = cli
            .cert
            .clone()
            .unwrap_or_else(|| config.client.cert_path.clone());

        Ok(Self {
            config,
            host,
            cert_path,
        })
    }

    fn transport_config(&self) -> TransportConfig {
        self.config.transport_config()
    }

    fn existing_certificate(&self) -> Result<CertificateInfo> {
        if !self.cert_path.exists() {
            bail!(
                "No certificate at {}; run `anymote pair` first or pass --cert",
                self.cert_path.display()
            );
        }
        CertificateInfo::load_from_file(&self.cert_path).context("Failed to load certificate")
    }

    async fn command_session(&self, port: Option<u16>) -> Result<CommandSession<TlsConnection>> {
        let certificate = self.existing_certificate()?;
        let port = port.unwrap_or(self.config.device.command_port);
        CommandSession::connect(&self.host, port, &certificate, &self.transport_config())
            .await
            .with_context(|| format!("Failed to connect to {}:{}", self.host, port))
    }
}

async fn prompt(question: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    let read = BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;
    if read == 0 {
        bail!("stdin closed before a code was entered");
    }
    Ok(line.trim().to_string())
}

fn pairing_failed(error: ProtocolError) -> anyhow::Error {
    anyhow!("Pairing failed: {}", error.user_message())
}

async fn pair(target: &Target, port: Option<u16>, client_name: Option<String>) -> Result<()> {
    let port = port.unwrap_or(target.config.device.pairing_port);
    let client_name = client_name.unwrap_or_else(|| target.config.client.name.clone());

    let certificate = CertificateInfo::load_or_generate(&target.cert_path, &client_name)
        .context("Failed to load certificate")?;
    info!(
        "Using certificate {} ({})",
        target.cert_path.display(),
        certificate.fingerprint
    );

    println!("Initiating pairing...");
    let mut session =
        PairingSession::connect(&target.host, port, certificate, &target.transport_config())
            .await
            .map_err(pairing_failed)?;

    session
        .send_pairing_request(&client_name, DEFAULT_SERVICE_NAME)
        .await
        .map_err(pairing_failed)?;
    session.send_options().await.map_err(pairing_failed)?;
    session
        .send_default_configuration()
        .await
        .map_err(pairing_failed)?;

    let secret = loop {
        let code = prompt("Code from the device: ").await?;
        match session.send_secret(&code).await {
            Ok(secret) => break secret,
            Err(e @ ProtocolError::InvalidArgument(_)) => println!("{}", e.user_message()),
            Err(e) => return Err(pairing_failed(e)),
        }
    };
    println!("Got secret (hash) back: {}", hex::encode_upper(secret));

    session.close().await?;
    println!("Done!");
    Ok(())
}

async fn send_keys(target: &Target, port: Option<u16>, keys: &[KeySpec]) -> Result<()> {
    let mut session = target.command_session(port).await?;
    for key in keys {
        debug!("Sending {:?}", key);
        match key.action {
            Some(action) => session.key_event(key.keycode, action).await?,
            None => session.press(key.keycode).await?,
        }
    }
    session.close().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_from(&config_path).context("Failed to load configuration")?;
    debug!("Configuration loaded from {}", config_path.display());

    let target = Target::new(&cli, config)?;

    match cli.command {
        Command::Pair { port, client_name } => pair(&target, port, client_name).await,
        Command::Fling { port, uri } => {
            let mut session = target.command_session(port).await?;
            session.fling(&uri).await?;
            session.close().await?;
            Ok(())
        }
        Command::Keys { port, keys } => send_keys(&target, port, &keys).await,
        Command::Mouse { port, dx, dy } => {
            let mut session = target.command_session(port).await?;
            session.mouse(dx, dy).await?;
            session.close().await?;
            Ok(())
        }
        Command::Scroll { port, x, y } => {
            let mut session = target.command_session(port).await?;
            session.scroll(x, y).await?;
            session.close().await?;
            Ok(())
        }
    }
}
