use crate::offline::{run_valuate, ValuateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use valuation::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Property Valuation Service",
    about = "Serve and exercise the dual-domain property valuation engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run a single valuation from a JSON attributes file and print the result
    Valuate(ValuateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Valuate(args) => run_valuate(args),
    }
}
