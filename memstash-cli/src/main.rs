use clap::{Parser, Subcommand};
use memstash::{Cache, CacheExt, TtlSecs};
use shared::config::Config;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Talk to the configured cache backend (see MEMSTASH_* environment variables)
#[derive(Parser, Debug)]
#[command(name = "memstash", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a value only if the key is absent
    Add {
        key: String,
        value: String,
        /// Seconds until expiry, 0 = never
        #[arg(long, default_value_t = 0)]
        ttl: u32,
        /// Parse VALUE as JSON before storing
        #[arg(long)]
        json: bool,
    },
    /// Store a value, overwriting any existing entry
    Set {
        key: String,
        value: String,
        #[arg(long, default_value_t = 0)]
        ttl: u32,
        #[arg(long)]
        json: bool,
    },
    /// Print the value stored under KEY
    Get {
        key: String,
        /// Decode the stored value as JSON and pretty-print it
        #[arg(long)]
        json: bool,
    },
    /// Exit 0 if KEY holds a value
    Contains { key: String },
    /// Delete KEY
    Remove { key: String },
    /// Print the cached value, adding VALUE first if the key is missing
    GetOrAdd {
        key: String,
        value: String,
        #[arg(long, default_value_t = 0)]
        ttl: u32,
    },
    /// Print the cached value, setting VALUE first if the key is missing
    GetOrSet {
        key: String,
        value: String,
        #[arg(long, default_value_t = 0)]
        ttl: u32,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Operation succeeded, with optional output for stdout
    Done(Option<String>),
    /// Miss, refused write, or unavailable backend
    Failed,
    /// Bad input from the command line
    Usage(String),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match dotenvy::dotenv() {
        Ok(path) => debug!("Loaded environment variables from {}", path.display()),
        Err(_) => debug!("No .env file found, using system environment variables"),
    }

    let cli = Cli::parse();
    let config = Config::from_env();

    let cache = match storage_engine::connect(&config) {
        Ok(cache) => cache,
        Err(e) => {
            error!("Failed to initialize {} backend: {}", config.backend.name(), e);
            return ExitCode::from(2);
        }
    };

    match run(cli.command, &cache) {
        Outcome::Done(output) => {
            if let Some(output) = output {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Outcome::Failed => ExitCode::FAILURE,
        Outcome::Usage(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::from(2)
        }
    }
}

fn run(command: Command, cache: &dyn Cache) -> Outcome {
    match command {
        Command::Add {
            key,
            value,
            ttl,
            json,
        } => write(&key, &value, TtlSecs(ttl), json, |k, v, t| cache.add(k, v, t), |k, v, t| {
            cache.add_json(k, v, t)
        }),
        Command::Set {
            key,
            value,
            ttl,
            json,
        } => write(&key, &value, TtlSecs(ttl), json, |k, v, t| cache.set(k, v, t), |k, v, t| {
            cache.set_json(k, v, t)
        }),
        Command::Get { key, json: false } => match cache.get(&key) {
            Some(value) => Outcome::Done(Some(value)),
            None => Outcome::Failed,
        },
        Command::Get { key, json: true } => match cache.get_json::<serde_json::Value>(&key) {
            Some(value) => match serde_json::to_string_pretty(&value) {
                Ok(pretty) => Outcome::Done(Some(pretty)),
                Err(_) => Outcome::Done(Some(value.to_string())),
            },
            None => Outcome::Failed,
        },
        Command::Contains { key } => flag(cache.contains(&key)),
        Command::Remove { key } => flag(cache.remove(&key)),
        Command::GetOrAdd { key, value, ttl } => {
            Outcome::Done(Some(cache.get_or_add(&key, || value, TtlSecs(ttl))))
        }
        Command::GetOrSet { key, value, ttl } => {
            Outcome::Done(Some(cache.get_or_set(&key, || value, TtlSecs(ttl))))
        }
    }
}

fn write<R, J>(key: &str, value: &str, ttl: TtlSecs, json: bool, raw: R, typed: J) -> Outcome
where
    R: FnOnce(&str, &str, TtlSecs) -> bool,
    J: FnOnce(&str, &serde_json::Value, TtlSecs) -> bool,
{
    if !json {
        return flag(raw(key, value, ttl));
    }
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(parsed) => flag(typed(key, &parsed, ttl)),
        Err(e) => Outcome::Usage(format!("VALUE is not valid JSON: {}", e)),
    }
}

fn flag(ok: bool) -> Outcome {
    if ok { Outcome::Done(None) } else { Outcome::Failed }
}
