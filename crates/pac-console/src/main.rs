mod app;
mod config;
mod grid;
mod locale;
mod logging;
mod session;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Args, Parser, Subcommand};
use config::{ConsoleConfig, Overrides};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use pac_client::{SnapshotClient, StreamSignal, SIGNAL_QUEUE_CAPACITY};
use pac_core::JobSubmission;
use ratatui::{backend::CrosstermBackend, Terminal};
use session::{Session, SignalOutcome, SnapshotDelivery};
use std::io;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pac-console")]
#[command(about = "Operator console for the phased-array scheduler", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a job to the scheduler and exit
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
struct SubmitArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value_t = 50)]
    priority: i64,
    #[arg(long, default_value_t = 16)]
    needed_elements: u32,
    /// Planned runtime in seconds
    #[arg(long, default_value_t = 60)]
    duration: u64,
    #[arg(long, default_value = "FPGA")]
    resource_type: String,
}

impl SubmitArgs {
    fn to_submission(&self) -> Result<JobSubmission, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("job name must not be empty".to_string());
        }
        let mut submission = JobSubmission::new(name);
        submission.priority = self.priority;
        submission.needed_elements = self.needed_elements;
        submission.duration_seconds = self.duration;
        let resource = self.resource_type.trim();
        submission.resource_type = (!resource.is_empty()).then(|| resource.to_string());
        Ok(submission)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = ConsoleConfig::load(&cli.overrides)?;

    match cli.command {
        Some(Command::Submit(args)) => {
            logging::init_logging(&config.log_dir, true);
            Ok(run_submit(&config, &args).await)
        }
        None => {
            let target = logging::init_logging(&config.log_dir, false);
            info!(?target, locale = %config.locale, theme = %config.theme, "logging_ready");
            run_console(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_submit(config: &ConsoleConfig, args: &SubmitArgs) -> ExitCode {
    let submission = match args.to_submission() {
        Ok(submission) => submission,
        Err(reason) => {
            eprintln!("pac-console: {reason}");
            return ExitCode::FAILURE;
        }
    };
    let client = match SnapshotClient::new(&config.client_config()) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("pac-console: {err}");
            return ExitCode::FAILURE;
        }
    };
    match client.submit_job(&submission).await {
        Ok(()) => {
            info!(name = %submission.name, "job_submitted");
            println!("submitted job '{}'", submission.name);
            ExitCode::SUCCESS
        }
        Err(err) => {
            warn!("submit_error: {err}");
            eprintln!("pac-console: submit failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_console(config: ConsoleConfig) -> Result<()> {
    let (signal_tx, mut signal_rx) = mpsc::channel(SIGNAL_QUEUE_CAPACITY);
    let (load_tx, mut load_rx) = mpsc::channel(4);
    let session = Session::new(
        &config.client_config(),
        config.stream_config(),
        config.stream_url.clone(),
        signal_tx,
        load_tx,
    )
    .context("Failed to build scheduler client")?;
    let mut app = App::new(session, config.locale.strings(), config.theme.palette());
    info!(api_base = %config.api_base, stream_url = %config.stream_url, "console_start");
    app.session.start();

    let mut terminal = setup_terminal().context("Failed to set up terminal")?;
    let result = run_app(&mut terminal, &mut app, &mut signal_rx, &mut load_rx).await;
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;
    app.session.close();
    info!("console_exit");
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    signal_rx: &mut mpsc::Receiver<StreamSignal>,
    load_rx: &mut mpsc::Receiver<SnapshotDelivery>,
) -> Result<()> {
    let mut events = EventStream::new();

    loop {
        terminal.draw(|frame| ui::render_ui(frame, app))?;
        tokio::select! {
            Some(signal) = signal_rx.recv() => {
                if let SignalOutcome::Status(status) = app.session.handle_signal(signal) {
                    info!(%status, "stream_status_changed");
                }
            }
            Some(delivery) = load_rx.recv() => {
                if app.session.finish_reload(delivery) {
                    app.status_note = Some(app.strings.note_reloaded.to_string());
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => {
                        if app.handle_input(event) {
                            break;
                        }
                    }
                    Some(Err(err)) => warn!("terminal_input_error: {err}"),
                    None => break,
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(name: &str) -> SubmitArgs {
        SubmitArgs {
            name: name.to_string(),
            priority: 50,
            needed_elements: 16,
            duration: 60,
            resource_type: "FPGA".to_string(),
        }
    }

    #[test]
    fn submit_requires_a_name() {
        assert!(args("   ").to_submission().is_err());
        let submission = args(" beam ").to_submission().unwrap();
        assert_eq!(submission.name, "beam");
        assert_eq!(submission.needed_elements, 16);
        assert_eq!(submission.resource_type.as_deref(), Some("FPGA"));
    }

    #[test]
    fn cli_parses_submit_with_global_flags() {
        let cli = Cli::try_parse_from([
            "pac-console",
            "submit",
            "--name",
            "sweep",
            "--priority",
            "9",
            "--api-base",
            "http://scheduler:1/api",
        ])
        .unwrap();
        assert_eq!(
            cli.overrides.api_base.as_deref(),
            Some("http://scheduler:1/api")
        );
        let Some(Command::Submit(submit)) = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(submit.priority, 9);
        assert_eq!(submit.duration, 60);
    }

    #[test]
    fn cli_without_subcommand_runs_the_console() {
        let cli = Cli::try_parse_from(["pac-console", "--theme", "ocean"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.overrides.theme.as_deref(), Some("ocean"));
    }
}
