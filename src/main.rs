use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tfipa::core::tfipa::{read_record, Outcome, TfIpa};
use tfipa::shared::logging;
use tfipa::user::state::{resolve_target_state, AccountState, LifecycleIntent};
use tracing::error;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "tfipa",
    about = "Manage FreeIPA users through their active, staged and preserved lifecycle.",
    version = APP_VERSION
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        help = "Path to the configuration file",
        global = true
    )]
    pub config: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PriorState {
    None,
    Active,
    Staged,
    Preserved,
}

impl PriorState {
    fn to_state(self) -> Option<AccountState> {
        match self {
            PriorState::None => None,
            PriorState::Active => Some(AccountState::Active),
            PriorState::Staged => Some(AccountState::Staged),
            PriorState::Preserved => Some(AccountState::Preserved),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve the target lifecycle state without contacting FreeIPA")]
    Resolve {
        #[arg(long, value_enum, default_value = "none")]
        prior: PriorState,
        #[arg(long, help = "Request the staged state")]
        staged: bool,
        #[arg(long, help = "Request the preserved state")]
        preserved: bool,
    },

    #[command(about = "Import an existing user by uid[;active|;staged|;preserved]")]
    Import { id: String },

    #[command(about = "Look up a user in any lifecycle state")]
    Show { uid: String },

    #[command(about = "Create or update a user from a planned record")]
    Apply {
        #[arg(long, value_name = "FILE")]
        plan: PathBuf,
        #[arg(long, value_name = "FILE", help = "Prior state record")]
        state: Option<PathBuf>,
        #[arg(
            long = "user-config",
            value_name = "FILE",
            help = "User-authored record, when it differs from the plan"
        )]
        user_config: Option<PathBuf>,
    },

    #[command(about = "Delete a user described by a state record")]
    Destroy {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    logging::init_logging();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the command reported errors through diagnostics.
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    if let Commands::Resolve {
        prior,
        staged,
        preserved,
    } = &cli.command
    {
        let intent = LifecycleIntent::new(*staged, *preserved);
        return match resolve_target_state(prior.to_state(), intent) {
            Ok(state) => {
                println!("{}", state);
                Ok(true)
            }
            Err(e) => {
                eprintln!("{}", e);
                Ok(false)
            }
        };
    }

    let tfipa = TfIpa::new(cli.config.clone())?;
    let outcome = match &cli.command {
        Commands::Resolve { .. } => Outcome::default(),
        Commands::Import { id } => tfipa.import(id).await,
        Commands::Show { uid } => tfipa.show(uid).await,
        Commands::Apply {
            plan,
            state,
            user_config,
        } => {
            let plan = read_record(plan)?;
            let state = state.as_deref().map(read_record).transpose()?;
            let user_config = user_config.as_deref().map(read_record).transpose()?;
            tfipa.apply(plan, state, user_config).await
        }
        Commands::Destroy { state } => tfipa.destroy(read_record(state)?).await,
    };

    print_outcome(&outcome)?;
    Ok(!outcome.diagnostics.has_errors())
}

fn print_outcome(outcome: &Outcome) -> anyhow::Result<()> {
    if !outcome.diagnostics.is_empty() {
        eprintln!("{}", serde_json::to_string_pretty(&outcome.diagnostics)?);
    }
    match &outcome.record {
        Some(record) => println!("{}", serde_json::to_string_pretty(record)?),
        None => println!("null"),
    }
    Ok(())
}
