//! Familyhub CLI
//!
//!   familyhub serve                      → Run the dashboard API server
//!   familyhub status [date]              → {"date", "completedSteps"}
//!   familyhub complete <step> [date]     → {"completedSteps", "allDone"}
//!   familyhub reset <evening|morning> [date]
//!   familyhub settings                   → {"key": "value", ...}
//!   familyhub set <key> <value>          → Upsert a setting
//!   familyhub scans [limit]              → Newest monster scans
//!
//! Dates default to today (UTC). Output is JSON, pretty on a tty.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use familyhub::logging::init_logging;
use familyhub::store::call_blocking;
use familyhub::{GoogleConfig, Hub, HubConfig, Scope, WeatherConfig};
use serde_json::{json, Map, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::info;

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("familyhub {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("serve") => cmd_serve(&opts),
        Some("status") => with_hub(&opts, cmd_status),
        Some("complete") => with_hub(&opts, cmd_complete),
        Some("reset") => with_hub(&opts, cmd_reset),
        Some("settings") => with_hub(&opts, cmd_settings),
        Some("set") => with_hub(&opts, cmd_set),
        Some("scans") => with_hub(&opts, cmd_scans),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || std::io::stdout().is_terminal();
    let render = |value: &Value| {
        if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) }
            .unwrap_or_else(|_| value.to_string())
    };

    match result {
        Ok(output) => println!("{}", render(&output)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)})));
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    positional: Vec<String>,
    app: Option<String>,
    data_dir: Option<String>,
    port: Option<u16>,
    total: Option<usize>,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        load_dotenv(".env");

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--app" | "-a" => {
                    if i + 1 < args.len() {
                        opts.app = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--data-dir" | "-d" => {
                    if i + 1 < args.len() {
                        opts.data_dir = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        opts.port = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--total" | "-t" => {
                    if i + 1 < args.len() {
                        opts.total = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        opts.positional = positional;

        // Environment is lower priority than CLI args
        if opts.app.is_none() {
            opts.app = env_value("FAMILYHUB_APP");
        }
        if opts.data_dir.is_none() {
            opts.data_dir = env_value("FAMILYHUB_DATA_DIR");
        }
        if opts.port.is_none() {
            opts.port = env_value("FAMILYHUB_PORT")
                .or_else(|| env_value("PORT"))
                .and_then(|s| s.parse().ok());
        }

        opts
    }

    fn arg(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    fn config(&self) -> HubConfig {
        let port = self.port.unwrap_or(familyhub::config::DEFAULT_PORT);
        let mut config = HubConfig::new(self.app.clone().unwrap_or_else(|| "familyhub".to_string())).with_port(port);
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir);
        }
        if let Some(secs) = env_value("FAMILYHUB_HTTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config = config.with_http_timeout(secs);
        }

        let mut google = GoogleConfig::default().with_redirect_uri(
            env_value("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| format!("http://localhost:{}/api/auth/google/callback", port)),
        );
        google.client_id = env_value("GOOGLE_CLIENT_ID");
        google.client_secret = env_value("GOOGLE_CLIENT_SECRET");
        google.refresh_token = env_value("GOOGLE_REFRESH_TOKEN");

        let mut weather = WeatherConfig::default();
        let coord = |key: &str| env_value(key).and_then(|s| s.parse::<f64>().ok());
        if let (Some(lat), Some(lon)) = (coord("FAMILYHUB_LAT"), coord("FAMILYHUB_LON")) {
            weather = weather.with_location(lat, lon);
        }

        config.with_google(google).with_weather(weather)
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `KEY=value` lines; existing environment wins.
fn load_dotenv(path: &str) {
    let Ok(contents) = std::fs::read_to_string(path) else { return };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && env::var(key.trim()).is_err() {
                env::set_var(key.trim(), value);
            }
        }
    }
}

fn print_usage() {
    println!(
        r#"familyhub - family dashboard server

USAGE:
    familyhub <command> [args] [options]

COMMANDS:
    serve                       Start HTTP server
    status [date]               Ritual steps completed on a date
    complete <step> [date]      Complete a ritual step
    reset <evening|morning> [date]
                                Clear one ritual for a date
    settings                    List settings
    set <key> <value>           Save a setting
    scans [limit]               Recent monster scans (default 10)

OPTIONS:
    --app, -a <name>            Application name (env: FAMILYHUB_APP)
    --data-dir, -d <path>       Data directory (env: FAMILYHUB_DATA_DIR)
    --port, -p <port>           Server port (default: 5000, env: FAMILYHUB_PORT, PORT)
    --total, -t <n>             Steps that make the ritual complete (complete only)
    --pretty                    Pretty-print JSON
    --version, -V               Print version

ENVIRONMENT:
    GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET, GOOGLE_REFRESH_TOKEN, GOOGLE_REDIRECT_URI
    FAMILYHUB_LAT, FAMILYHUB_LON   Default weather location
    FAMILYHUB_HTTP_TIMEOUT_SECS    Outbound request timeout (default 10)
    FAMILYHUB_LOG                  Log filter when RUST_LOG is unset
    FAMILYHUB_LOG_JSON=1           JSON log lines

SETTINGS:
    home_assistant_url, home_assistant_token
    home_assistant_sleep_scene      (default scene.sleep_mode)
    home_assistant_bedroom_light    (default light.bedroom)
    home_assistant_dashboard_entities  JSON [{{"id", "friendlyName", "type"}}]

EXAMPLES:
    familyhub serve --port 5000
    familyhub complete TEETH 2026-10-16 --total 3
    familyhub set home_assistant_url http://homeassistant.local:8123"#
    );
}

fn today() -> String { Utc::now().format("%Y-%m-%d").to_string() }

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create runtime")
}

/// Open the hub and run one async command against it.
fn with_hub<'a, F, Fut>(opts: &'a ParsedArgs, command: F) -> Result<Value>
where
    F: FnOnce(Arc<Hub>, &'a ParsedArgs) -> Fut,
    Fut: std::future::Future<Output = Result<Value>>,
{
    let rt = runtime()?;
    let hub = Arc::new(Hub::open(opts.config()).context("Failed to open store")?);
    rt.block_on(command(hub, opts))
}

async fn cmd_status(hub: Arc<Hub>, opts: &ParsedArgs) -> Result<Value> {
    let date = opts.arg(0).map(str::to_string).unwrap_or_else(today);
    Ok(serde_json::to_value(hub.ritual.status(&date).await?)?)
}

async fn cmd_complete(hub: Arc<Hub>, opts: &ParsedArgs) -> Result<Value> {
    let step = opts.arg(0).ok_or_else(|| anyhow!("Usage: familyhub complete <step> [date]"))?;
    let date = opts.arg(1).map(str::to_string).unwrap_or_else(today);
    let done = hub.ritual.complete_step(&date, step, opts.total).await?;
    // Let the sleep scene request go out before the runtime is dropped
    if done.all_done {
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
    Ok(serde_json::to_value(done)?)
}

async fn cmd_reset(hub: Arc<Hub>, opts: &ParsedArgs) -> Result<Value> {
    let scope = match opts.arg(0) {
        Some(raw) => raw.parse::<Scope>()?,
        None => bail!("Usage: familyhub reset <evening|morning> [date]"),
    };
    let date = opts.arg(1).map(str::to_string).unwrap_or_else(today);
    let removed = hub.ritual.reset(&date, scope).await?;
    Ok(json!({"success": true, "date": date, "removed": removed}))
}

async fn cmd_settings(hub: Arc<Hub>, _opts: &ParsedArgs) -> Result<Value> {
    let all = call_blocking(hub.store.clone(), |s| s.all_settings()).await?;
    Ok(Value::Object(all.into_iter().map(|s| (s.key, Value::String(s.value))).collect::<Map<_, _>>()))
}

async fn cmd_set(hub: Arc<Hub>, opts: &ParsedArgs) -> Result<Value> {
    let (Some(key), Some(value)) = (opts.arg(0), opts.arg(1)) else {
        bail!("Usage: familyhub set <key> <value>");
    };
    let (key, value) = (key.to_string(), value.to_string());
    let setting = call_blocking(hub.store.clone(), move |s| s.set_setting(&key, &value)).await?;
    Ok(json!({"success": true, "setting": setting}))
}

async fn cmd_scans(hub: Arc<Hub>, opts: &ParsedArgs) -> Result<Value> {
    let limit = familyhub::monster::parse_limit(opts.arg(0));
    Ok(json!({"scans": hub.monster.history(limit).await?}))
}

fn cmd_serve(opts: &ParsedArgs) -> Result<Value> {
    use familyhub::{create_router_with_name, install_signal_handlers};

    let config = opts.config();
    let (port, app_name) = (config.port, config.app.clone());
    let hub = Arc::new(Hub::open(config).context("Failed to open store")?);

    let rt = runtime()?;
    rt.block_on(async {
        let shutdown = install_signal_handlers();

        if hub.calendar.is_connected() {
            info!("Google Calendar connected");
        } else {
            info!("Google Calendar not connected; visit /api/auth/google to set it up");
        }

        let router = create_router_with_name(hub, &app_name);
        let addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Familyhub listening on http://{}", addr);

        tokio::select! {
            result = axum::serve(listener, router) => {
                result.context("Server error")?;
            }
            _ = shutdown.wait() => {
                info!("Shutdown signal received, stopping server...");
            }
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(json!({"status": "stopped"}))
}
