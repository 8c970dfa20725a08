use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "nutrilingo",
    version,
    about = "Scan restaurant menus, translate them and track calories"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// OCR a menu photo and translate its lines
    Scan {
        /// Menu image (png, jpeg, ...)
        image: PathBuf,

        /// Target language (en, fr, es, de, hi, zh, ja, it)
        #[arg(short = 'l', long = "lang")]
        lang: Option<String>,

        /// Log these menu lines after scanning (numbers as printed, from 1)
        #[arg(short = 's', long = "select", value_delimiter = ',')]
        select: Vec<usize>,

        #[arg(short = 'u', long = "user", requires = "select")]
        user: Option<String>,

        /// Day to log against (YYYY-MM-DD, default today)
        #[arg(short = 'd', long = "date", requires = "select")]
        date: Option<String>,
    },
    /// Look up nutrition values for dish names
    Resolve {
        #[arg(required = true)]
        dishes: Vec<String>,
    },
    /// Resolve dishes and add their calories to the daily log
    Log {
        #[arg(short = 'u', long = "user")]
        user: Option<String>,

        /// Day to log against (YYYY-MM-DD, default today)
        #[arg(short = 'd', long = "date")]
        date: Option<String>,

        #[arg(required = true)]
        dishes: Vec<String>,
    },
    /// Show the calories logged for a day
    Total {
        #[arg(short = 'u', long = "user")]
        user: Option<String>,

        /// Day to total (YYYY-MM-DD, default today)
        #[arg(short = 'd', long = "date")]
        date: Option<String>,
    },
    /// Run the JSON HTTP API
    Serve {
        /// Listen address (default from settings [server] addr)
        #[arg(long = "addr")]
        addr: Option<String>,
    },
}

impl From<CliCommand> for nutrilingo::Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Scan {
                image,
                lang,
                select,
                user,
                date,
            } => nutrilingo::Command::Scan {
                image,
                lang,
                select,
                user,
                date,
            },
            CliCommand::Resolve { dishes } => nutrilingo::Command::Resolve { dishes },
            CliCommand::Log { user, date, dishes } => {
                nutrilingo::Command::Log { user, dishes, date }
            }
            CliCommand::Total { user, date } => nutrilingo::Command::Total { user, date },
            CliCommand::Serve { addr } => nutrilingo::Command::Serve { addr },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    nutrilingo::logging::init(cli.verbose)?;

    let output = nutrilingo::run(
        nutrilingo::Config {
            settings_path: cli.read_settings,
        },
        cli.command.into(),
    )
    .await?;

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
