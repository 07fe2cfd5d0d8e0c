#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use bing_tools::background::Background;
use bing_tools::config::{AppConfig, FeatureSettings, FilenameRuleSet, FullscreenRecord};
use bing_tools::constants::storage;
use bing_tools::download::{DownloadComposer, HttpDownloader};
use bing_tools::fullscreen::MemoryFullscreen;
use bing_tools::i18n::{BuiltinStrings, Localizer};
use bing_tools::ipc::{DownloadImage, IpcConnection, IpcServer, Request};
use bing_tools::page::MemoryDom;
use bing_tools::session::{Dispatcher, PageEvent, PageSession};
use bing_tools::settings::{JsonFileStore, SettingsAdapter};

#[derive(Parser)]
#[command(name = "bing-tools")]
#[command(about = "Fullscreen viewer and download naming for the Bing wallpaper page")]
#[command(version)]
struct Cli {
    /// Settings store file (default: $BING_TOOLS_STORE or the config dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Session socket path
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Language for labels and messages
    #[arg(long, global = true)]
    lang: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the download URL and filename for a page fixture
    Compose {
        /// JSON page fixture
        page: PathBuf,
        /// Days before the page's image (0 to 7)
        #[arg(long, default_value_t = 0)]
        days_back: u32,
    },
    /// Compose and download the image of a page fixture
    Download {
        page: PathBuf,
        /// Target directory (default: the user's download dir)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Inspect or change stored settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Answer protocol requests on the session socket
    Serve {
        /// Mount a page session on this fixture
        #[arg(long)]
        page: Option<PathBuf>,
    },
    /// Send one raw protocol message to a running session
    Send {
        /// e.g. '{"action":"getFullscreenState"}'
        message: String,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print every stored key
    Show,
    /// Store a JSON value under a key
    Set { key: String, value: String },
    /// Write defaults for every key
    Reset,
}

const STORED_KEYS: [&str; 3] = [
    storage::SETTINGS,
    storage::FULLSCREEN_STATE,
    storage::DOWNLOAD_SETTINGS,
];

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = AppConfig::resolve(cli.store, cli.socket, cli.lang)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(config, cli.command))
}

async fn run(config: AppConfig, command: Commands) -> Result<()> {
    let settings = SettingsAdapter::new(Arc::new(JsonFileStore::new(&config.store_path)));
    let strings: Arc<dyn Localizer> = Arc::new(BuiltinStrings::for_language(&config.language));

    match command {
        Commands::Compose { page, days_back } => {
            let composer = compose(&page, settings, strings, days_back).await?;
            let Some(info) = composer.info() else {
                bail!("No download link on page {}", page.display());
            };
            println!("{}", info.source_url);
            println!("{}", info.final_filename);
        }
        Commands::Download { page, dir } => {
            let composer = compose(&page, settings.clone(), strings, 0).await?;
            let Some(info) = composer.info() else {
                bail!("No download link on page {}", page.display());
            };
            let downloader = HttpDownloader::new(dir.unwrap_or(config.download_dir));
            let background = Background::new(settings, Arc::new(downloader));
            let response = background
                .handle(Request::DownloadImage(DownloadImage {
                    url: info.source_url.clone(),
                    filename: info.final_filename.clone(),
                }))
                .await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                bail!("Download failed");
            }
        }
        Commands::Settings { command } => run_settings(settings, command).await?,
        Commands::Serve { page } => serve(&config, settings, strings, page.as_deref()).await?,
        Commands::Send { message } => {
            let raw: Value = serde_json::from_str(&message).context("Message is not valid JSON")?;
            let mut conn = IpcConnection::connect_to(&config.socket_path).await?;
            let response = conn.request(&raw).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

/// Mount a download composer on a fixture and step back `days_back` days
async fn compose(
    page: &Path,
    settings: SettingsAdapter,
    strings: Arc<dyn Localizer>,
    days_back: u32,
) -> Result<DownloadComposer> {
    let dom = Arc::new(MemoryDom::load(page)?);
    let features: FeatureSettings = settings.load_merged(storage::SETTINGS).await;
    let mut composer = DownloadComposer::new(dom, settings, strings);
    composer.mount(&features).await;
    for _ in 0..days_back {
        composer.on_previous();
    }
    Ok(composer)
}

async fn run_settings(settings: SettingsAdapter, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let mut all = serde_json::Map::new();
            for key in STORED_KEYS {
                all.insert(key.to_string(), settings.get(key).await.unwrap_or(Value::Null));
            }
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
        SettingsCommand::Set { key, value } => {
            if !STORED_KEYS.contains(&key.as_str()) {
                warn!(key = %key, "Storing a key the extension does not read");
            }
            let value: Value = serde_json::from_str(&value).context("Value is not valid JSON")?;
            if !settings.set(&key, value).await {
                bail!("Failed to store {key}");
            }
        }
        SettingsCommand::Reset => {
            let saved = settings.set_as(storage::SETTINGS, &FeatureSettings::default()).await
                && settings
                    .set_as(storage::DOWNLOAD_SETTINGS, &FilenameRuleSet::default())
                    .await
                && settings
                    .set_as(storage::FULLSCREEN_STATE, &FullscreenRecord::now(false))
                    .await;
            if !saved {
                bail!("Failed to reset settings");
            }
            info!("Settings reset to defaults");
        }
    }
    Ok(())
}

async fn serve(
    config: &AppConfig,
    settings: SettingsAdapter,
    strings: Arc<dyn Localizer>,
    page: Option<&Path>,
) -> Result<()> {
    let downloader = HttpDownloader::new(&config.download_dir);
    let background = Arc::new(Background::new(settings.clone(), Arc::new(downloader)));
    if background.install().await {
        info!(store = %config.store_path.display(), "First run");
    }

    let handle = match page {
        Some(path) => {
            let dom = Arc::new(MemoryDom::load(path)?);
            let native = Arc::new(MemoryFullscreen::new());
            let (mut session, handle) = PageSession::new(dom, native.clone(), settings, strings);
            let notifier = handle.clone();
            native.on_change(move |_| notifier.notify(PageEvent::NativeFullscreenChanged));
            session.mount().await;
            tokio::spawn(session.run());
            info!(page = %path.display(), "Page session running");
            Some(handle)
        }
        None => None,
    };

    let dispatcher = Dispatcher::new(handle.clone(), background);
    let server = IpcServer::bind_to(config.socket_path.clone())?;
    info!(socket = %server.path().display(), "Serving protocol requests");

    loop {
        tokio::select! {
            conn = server.accept() => {
                let mut conn = match conn {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                        continue;
                    }
                };
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    loop {
                        let raw = match conn.recv().await {
                            Ok(Some(raw)) => raw,
                            Ok(None) => break,
                            Err(e) => {
                                warn!(error = %e, "Dropping connection");
                                break;
                            }
                        };
                        let response = dispatcher.dispatch(raw).await;
                        if let Err(e) = conn.send(&response).await {
                            warn!(error = %e, "Failed to send response");
                            break;
                        }
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    if let Some(handle) = handle
        && let Err(e) = handle.send(PageEvent::Shutdown).await
    {
        warn!(error = %e, "Page session already stopped");
    }
    Ok(())
}
