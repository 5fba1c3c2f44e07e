use clap::{Parser, Subcommand};
use hashflog::cli::{self as prog_cli, Command, Context};
use hashflog::config::{self, StoreConfig};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hashflog", version, about = "Append-only encrypted credential store", long_about = None)]
struct Cli {
    /// Path to a config file (TOML)
    #[arg(long, help = "Path to a config file (TOML). If omitted, the default search path is used.")]
    config: Option<PathBuf>,
    /// Override the data directory (takes precedence over config)
    #[arg(long, help = "Directory holding users.log and users.idx. Takes precedence over config/env.")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Register or replace the credential for an email")]
    Register {
        email: String,
        #[arg(help = "Plain-text password. Prompted for if omitted.")]
        password: Option<String>,
    },
    #[command(alias = "login", about = "Check an email/password pair")]
    Verify {
        email: String,
        #[arg(help = "Plain-text password. Prompted for if omitted.")]
        password: Option<String>,
    },
    #[command(about = "Rewrite the log keeping only the latest record per identity")]
    Compact,
    #[command(about = "Generate a new hex encryption key for FILE_ENCRYPTION_KEY")]
    Keygen,
}

fn password_or_prompt(password: Option<String>) -> std::io::Result<String> {
    match password {
        Some(p) => Ok(p),
        None => rpassword::prompt_password("Password: "),
    }
}

fn into_command(cmd: Commands) -> std::io::Result<Command> {
    Ok(match cmd {
        Commands::Register { email, password } => {
            Command::Register { email, password: password_or_prompt(password)? }
        }
        Commands::Verify { email, password } => {
            Command::Verify { email, password: password_or_prompt(password)? }
        }
        Commands::Compact => Command::Compact,
        Commands::Keygen => Command::Keygen,
    })
}

fn fail(msg: String) -> ! {
    println!("{}", json!({"status": "error", "msg": msg}));
    std::process::exit(1);
}

fn main() {
    hashflog::logger::configure_from_env();
    let cli = Cli::parse();

    let cfg = StoreConfig::load(cli.config.as_deref(), cli.data_dir.as_deref())
        .unwrap_or_else(|e| fail(e.to_string()));
    let cmd = into_command(cli.command).unwrap_or_else(|e| fail(format!("reading password: {e}")));
    let ctx = Context::from_config(&cfg, config::key_from_env().ok());

    let outcome = prog_cli::run(&ctx, cmd);
    println!("{}", outcome.json);
    std::process::exit(outcome.exit_code);
}
