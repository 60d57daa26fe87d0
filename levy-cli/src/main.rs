use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use levy_core::DecisionAction;
use rust_decimal::Decimal;
use tracing::{debug, error};

use levy_cli::app;
use levy_cli::config::{AppConfig, CliOverrides};
use levy_cli::logging;

/// Ghana VAT levy calculator.
///
/// Computes the NHIL / GETFund / COVID-19 levy cascade and VAT for a gross
/// sales figure, and manages levy rates through a maker-checker workflow.
#[derive(Debug, Parser)]
#[command(name = "gra-levy", version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to ./gra-levy.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database backend to use.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Database connection string.
    /// For SQLite this is a file path (e.g. `levies.db`) or `:memory:`.
    #[arg(long, global = true)]
    db: Option<String>,

    /// Currency code printed before amounts.
    #[arg(long, global = true)]
    currency: Option<String>,

    /// Log level or EnvFilter directive. RUST_LOG wins when set.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Append log output to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Fail instead of using the built-in rate table.
    #[arg(long, global = true, default_value_t = false)]
    no_fallback: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute levies, VAT and total payable for a gross sales figure.
    Compute {
        /// Gross sales, e.g. 50000 or "GHS 50,000.00".
        gross_sales: String,

        /// Print the result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Inspect and change levy rates.
    #[command(subcommand)]
    Rates(RatesCommand),

    /// Assess a PSP sales feed (merchant_tin,period,gross_sales).
    Assess {
        sales_file: PathBuf,

        /// Print the result as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RatesCommand {
    /// List configured levies.
    List,

    /// Show the rate-change history of a levy.
    History { levy_id: i64 },

    /// Propose a new rate (maker).
    Propose {
        levy_id: i64,
        /// New rate as a percentage, e.g. 2.5.
        rate: Decimal,
        #[command(flatten)]
        actor: Actor,
    },

    /// Approve the pending rate change (checker).
    Approve {
        levy_id: i64,
        #[command(flatten)]
        actor: Actor,
    },

    /// Reject the pending rate change (checker).
    Reject {
        levy_id: i64,
        #[command(flatten)]
        actor: Actor,
    },
}

#[derive(Debug, Args)]
struct Actor {
    /// User making the request.
    #[arg(long = "by")]
    by: String,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            backend: self.backend.clone(),
            db: self.db.clone(),
            currency: self.currency.clone(),
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
            no_fallback: self.no_fallback,
        }
    }
}

async fn run(
    cli: Cli,
    config: AppConfig,
) -> anyhow::Result<String> {
    let registry = app::build_registry();

    match cli.command {
        Commands::Compute { gross_sales, json } => {
            app::run_compute(&registry, &config, &gross_sales, json).await
        }
        Commands::Assess { sales_file, json } => {
            app::run_assess(&registry, &config, &sales_file, json).await
        }
        Commands::Rates(command) => {
            let repo = app::open_repository(&registry, &config.db_config()).await?;
            match command {
                RatesCommand::List => app::rates_list(&*repo).await,
                RatesCommand::History { levy_id } => app::rates_history(&*repo, levy_id).await,
                RatesCommand::Propose {
                    levy_id,
                    rate,
                    actor,
                } => app::rates_propose(&*repo, levy_id, rate, &actor.by).await,
                RatesCommand::Approve { levy_id, actor } => {
                    app::rates_decide(&*repo, levy_id, DecisionAction::Approve, &actor.by).await
                }
                RatesCommand::Reject { levy_id, actor } => {
                    app::rates_decide(&*repo, levy_id, DecisionAction::Reject, &actor.by).await
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config.apply(cli.overrides()),
        Err(e) => {
            eprintln!("error: {:#}", anyhow::Error::new(e));
            return ExitCode::from(2);
        }
    };

    let log_file = match config.logging.file.as_deref().map(logging::open_log_file).transpose() {
        Ok(file) => file,
        Err(e) => {
            eprintln!("warning: {e:#}");
            None
        }
    };
    logging::init_logging(&config.logging.level, log_file);
    debug!(?config, "configuration loaded");

    match run(cli, config).await {
        Ok(output) => {
            print!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
