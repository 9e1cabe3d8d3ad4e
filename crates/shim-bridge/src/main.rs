use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::anyhow;
use serde_json::value::RawValue;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use shim_bridge::config::parse_timeout;
use shim_bridge::{CallStack, Request, RequestId, Shim, ShimConfig};

#[derive(Debug, PartialEq)]
enum Command {
    Action {
        agent: String,
        action: String,
        data: Option<String>,
    },
    Parse(String),
    Validate(String),
    ValidateStack(String),
}

#[derive(Debug, PartialEq)]
struct Args {
    shim: Option<PathBuf>,
    config: Option<PathBuf>,
    timeout: Option<Duration>,
    command: Command,
}

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();

    let args = match parse_args(&argv) {
        Ok(v) => v,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            print_usage();
            process::exit(2);
        }
    };

    init_tracing();

    if let Err(e) = run(args).await {
        eprintln!("{}", report(&e));
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: shim-bridge [--shim <path>] [--config <path>] [--timeout <secs>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  action <agent> <action> [<json-data>]   Invoke an agent action and print the reply");
    eprintln!("  parse <filter>                          Print the call stack of a compound filter");
    eprintln!("  validate <filter>                       Print whether a compound filter matches");
    eprintln!("  validate-stack <call-stack>             Print whether a parsed call stack matches");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --shim <path>      Shim executable [env: SHIM_BRIDGE_EXECUTABLE]");
    eprintln!("  --config <path>    Shim configuration file [env: SHIM_BRIDGE_CONFIG]");
    eprintln!("  --timeout <secs>   Timeout for actions and validation [env: SHIM_BRIDGE_TIMEOUT, default: 10]");
}

/// Install the stderr subscriber; stdout carries only the reply.
///
/// `RUST_LOG` wins when set. Otherwise `SHIM_BRIDGE_LOG` picks the level for
/// this crate's targets, and `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(format!(
            "shim_bridge={}",
            log_level(std::env::var("SHIM_BRIDGE_LOG").ok().as_deref())
        )),
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        _ => fmt::layer().with_writer(std::io::stderr).boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init();
}

fn log_level(setting: Option<&str>) -> &'static str {
    match setting.map(str::to_ascii_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("warn" | "warning") => "warn",
        Some("error") => "error",
        _ => "info",
    }
}

/// Top-level failure line. Causes already appear in each error's own
/// message, so the chain is not appended again.
fn report(err: &anyhow::Error) -> String {
    format!("error: {err}")
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut shim = None;
    let mut config = None;
    let mut timeout = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--shim" => {
                i += 1;
                shim = Some(PathBuf::from(args.get(i).ok_or("--shim requires a value")?));
            }
            "--config" => {
                i += 1;
                config = Some(PathBuf::from(
                    args.get(i).ok_or("--config requires a value")?,
                ));
            }
            "--timeout" => {
                i += 1;
                let raw = args.get(i).ok_or("--timeout requires a value")?;
                timeout = Some(parse_timeout("--timeout", raw).map_err(|e| e.to_string())?);
            }
            "--help" | "-h" => return Err(String::new()),
            arg if arg.starts_with("--") => return Err(format!("unknown flag: {arg}")),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or("missing command")?;
    let mut required = |what: &str| {
        positional
            .next()
            .ok_or_else(|| format!("{name} requires <{what}>"))
    };

    let command = match name.as_str() {
        "action" => Command::Action {
            agent: required("agent")?,
            action: required("action")?,
            data: positional.next(),
        },
        "parse" => Command::Parse(required("filter")?),
        "validate" => Command::Validate(required("filter")?),
        "validate-stack" => Command::ValidateStack(required("call-stack")?),
        other => return Err(format!("unknown command: {other}")),
    };

    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument: {extra}"));
    }

    Ok(Args {
        shim,
        config,
        timeout,
        command,
    })
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = ShimConfig::from_env()?;
    if let Some(shim) = args.shim {
        config.executable = shim;
    }
    if let Some(path) = args.config {
        config.config = path;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }

    let timeout = config.timeout;
    let shim = Shim::new(config);

    match args.command {
        Command::Action {
            agent,
            action,
            data,
        } => {
            let mut request = Request::new(agent, action)
                .with_request_id(RequestId::generate())
                .with_time(chrono::Utc::now());
            if let Some(data) = data {
                let data = RawValue::from_string(data)
                    .map_err(|e| anyhow!("action data is not valid JSON: {e}"))?;
                request = request.with_data(data);
            }

            let reply: serde_json::Value = shim.invoke_action(&request, timeout).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
        Command::Parse(filter) => {
            let stack = shim.parse_compound_filter(&filter).await?;
            println!("{stack}");
        }
        Command::Validate(filter) => {
            let matched = shim.validate_compound_filter(&filter, timeout).await?;
            println!("{matched}");
        }
        Command::ValidateStack(stack) => {
            let matched = shim
                .validate_compound_call_stack(&CallStack::from(stack), timeout)
                .await?;
            println!("{matched}");
        }
    }

    Ok(())
}
