use crate::{
    actions::scripted::{PhaseTimeouts, Scenario, ScriptedControlPlane},
    commands::{self, restart::RestartStrategy},
    helpers::{load_config::Config, shutdown::interrupt_signal},
    instrumentation,
    poller::poller::LogFilter,
    streaming::stream_logs::LogStreamer,
    ui::ui::{TerminalUi, Ui},
};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "paasctl",
    long_about = "paasctl drives application lifecycle operations on the platform and follows their progress live: staging output, state changes, warnings and failures.",
    about = "Start, restart, restage and tail applications",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        paasctl start web
        paasctl restart web --strategy rolling
        paasctl logs web --recent
        paasctl --scenario ./scenarios/crash.json start web"
)]
struct Cli {
    /// Configuration file, defaults to $XDG_CONFIG_HOME/paasctl/config.toml
    #[arg(short, long, global = true, env = "PAASCTL_CONFIG")]
    config: Option<PathBuf>,

    /// JSON timeline the scripted control plane replays instead of the
    /// built-in demo session
    #[arg(long, global = true, env = "PAASCTL_SCENARIO")]
    scenario: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a stopped app
    Start {
        app: String,
        #[command(flatten)]
        output: PollOutput,
    },

    /// Stop all instances of the app, then start them again
    Restart {
        app: String,
        /// Deployment strategy, `rolling` replaces instances without downtime
        #[arg(long, value_enum, default_value_t = RestartStrategy::Stop)]
        strategy: RestartStrategy,
        #[command(flatten)]
        output: PollOutput,
    },

    /// Stage the app's current package again and restart it
    Restage {
        app: String,
        #[command(flatten)]
        output: PollOutput,
    },

    /// Tail or show recent logs for an app
    Logs {
        app: String,
        /// Dump recent logs instead of tailing
        #[arg(long)]
        recent: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Output options shared by the lifecycle commands.
#[derive(Debug, Args)]
struct PollOutput {
    /// Also show the app's runtime output while waiting, not only staging output
    #[arg(long)]
    all_logs: bool,
}

impl PollOutput {
    fn log_filter(&self) -> LogFilter {
        if self.all_logs {
            LogFilter::All
        } else {
            LogFilter::StagingOnly
        }
    }
}

/// Entry function for CLI
pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let ui = Arc::new(TerminalUi::new());

    match execute(cli, ui.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            ui.display_error(&*err);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli, ui: Arc<TerminalUi>) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    // Held until the command returns so buffered diagnostics are flushed.
    let _guard = match instrumentation::tracing::init_tracing(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            ui.display_warning(&format!("Diagnostics logging disabled: {e}"));
            None
        }
    };
    tracing::info!(command = ?cli.command, "paasctl invoked");

    match cli.command {
        Commands::Start { app, output } => {
            let plane = control_plane(cli.scenario.as_deref(), &app, &config)?;
            commands::start::start(&plane, ui.as_ref(), &config, &app, output.log_filter()).await?;
        }
        Commands::Restart {
            app,
            strategy,
            output,
        } => {
            let plane = control_plane(cli.scenario.as_deref(), &app, &config)?;
            commands::restart::restart(
                &plane,
                ui.as_ref(),
                &config,
                &app,
                strategy,
                output.log_filter(),
            )
            .await?;
        }
        Commands::Restage { app, output } => {
            let plane = control_plane(cli.scenario.as_deref(), &app, &config)?;
            commands::restage::restage(&plane, ui.as_ref(), &config, &app, output.log_filter())
                .await?;
        }
        Commands::Logs { app, recent } => {
            let plane = control_plane(cli.scenario.as_deref(), &app, &config)?;
            let streamer = LogStreamer::new(
                Arc::new(plane.transport()),
                Arc::new(plane.refresher()),
                config.token_refresh_interval(),
            );
            commands::logs::logs(
                &plane,
                &streamer,
                ui.clone(),
                &config,
                &app,
                recent,
                interrupt_signal(),
            )
            .await?;
        }
        Commands::Config => ui.display_text(config.to_toml()?.trim_end()),
    }

    Ok(())
}

//
// ------------------------ Control plane wiring ------------------------------
//

fn control_plane(scenario: Option<&Path>, app: &str, config: &Config) -> Result<ScriptedControlPlane> {
    let scenario = match scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::demo(app),
    };
    let timeouts = PhaseTimeouts {
        staging: config.timeouts.staging(),
        startup: config.timeouts.startup(),
    };
    Ok(ScriptedControlPlane::new(scenario, timeouts))
}
