use clap::{Parser, Subcommand};
use studymate::Result;
use studymate::commands::{
    reset_session, run_chat_command, run_quiz_command, run_start, show_status,
};
use studymate::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "studymate")]
#[command(about = "A study assistant that indexes your material and drives quiz and chat study aids")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model provider and study settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start or resume a study session
    Start,
    /// Generate and take a quiz on the saved subject
    Quiz,
    /// Chat about the saved subject
    Chat,
    /// Show session, index and quiz state
    Status,
    /// Delete the session, transcript and uploaded files
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Start => {
            run_start(&Config::load()?).await?;
        }
        Commands::Quiz => {
            run_quiz_command(&Config::load()?).await?;
        }
        Commands::Chat => {
            run_chat_command(&Config::load()?).await?;
        }
        Commands::Status => {
            show_status(&Config::load()?).await?;
        }
        Commands::Reset => {
            reset_session(&Config::load()?)?;
        }
    }

    Ok(())
}
