use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use stepwise::{logging, Config, LocationStore, MemoryLocation, Step, Wizard};

mod repl;

use repl::{Command, CommandError};

#[derive(Parser)]
#[command(name = "stepwise")]
#[command(about = "Drive a multi-step wizard from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a wizard interactively (default)
    Run(RunArgs),

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Comma-separated step keys
    #[arg(long, value_delimiter = ',', default_value = "intro,details,done")]
    steps: Vec<String>,

    /// Initial step (0-based), overrides wizard.start_index
    #[arg(long)]
    start: Option<usize>,

    /// Sync the active step with the location fragment
    #[arg(long)]
    hash: bool,

    /// Initial location value, e.g. "#details"
    #[arg(long)]
    location: Option<String>,

    /// Compose each step inside a wrapper
    #[arg(long)]
    wrap: bool,

    /// Fail gates that take longer than this many milliseconds
    #[arg(long)]
    gate_timeout_ms: Option<u64>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            steps: vec!["intro".into(), "details".into(), "done".into()],
            start: None,
            hash: false,
            location: None,
            wrap: false,
            gate_timeout_ms: None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _logging = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Run(args)) => run(config, args).await,
        None => run(config, RunArgs::default()).await,
    }
}

fn build_wizard(config: &Config, args: &RunArgs, location: &MemoryLocation) -> Wizard<String> {
    let mut options = config.wizard.clone();
    if let Some(start) = args.start {
        options.start_index = start;
    }
    if args.hash {
        options.hash_enabled = true;
    }

    let steps = args
        .steps
        .iter()
        .filter(|key| !key.is_empty())
        .map(|key| Step::keyed(key.clone(), format!("Step `{key}`")));

    let mut builder = Wizard::builder(steps)
        .options(options)
        .location(Arc::new(location.clone()))
        .diagnostics(config.diagnostics_sink())
        .header("stepwise".to_string())
        .footer("type `help` for commands".to_string());
    if args.wrap {
        builder = builder.wrapper("frame".to_string());
    }
    if let Some(ms) = args.gate_timeout_ms {
        builder = builder.gate_timeout(Duration::from_millis(ms));
    }
    builder.build()
}

fn print_state(wizard: &Wizard<String>, location: &MemoryLocation) {
    println!("{}", repl::render_view(&wizard.view()));
    println!("{}", repl::status_line(&wizard.snapshot(), &location.read()));
}

async fn run(config: Config, args: RunArgs) -> Result<()> {
    let location = MemoryLocation::new(args.location.clone().unwrap_or_default());
    let wizard = build_wizard(&config, &args, &location);

    // Announce gate runs as they start
    let mut snapshots = wizard.subscribe();
    let watcher = tokio::spawn(async move {
        let mut loading = snapshots.borrow().is_loading;
        while snapshots.changed().await.is_ok() {
            let now = snapshots.borrow_and_update().is_loading;
            if now && !loading {
                println!("  ... gate running");
            }
            loading = now;
        }
    });

    print_state(&wizard, &location);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match command {
            Command::Next => match wizard.next_step().await {
                Ok(transition) => println!("{}", repl::describe_transition(transition)),
                Err(err) => println!("gate failed: {err}"),
            },
            Command::Back => {
                if !wizard.previous_step() {
                    println!("already on the first step");
                }
            }
            Command::Goto(index) => {
                if !wizard.go_to_step(index) && wizard.snapshot().active_step != index {
                    println!("no step {}", index + 1);
                }
            }
            Command::Hash(value) => {
                location.set_external(&value);
            }
            Command::Gate(mode) => {
                wizard.handle_step(repl::gate_handler(mode));
                println!("gate registered for this step");
            }
            Command::Status => {}
            Command::Help => {
                println!("{}", repl::HELP);
                continue;
            }
            Command::Quit => break,
        }

        print_state(&wizard, &location);
    }

    drop(wizard);
    watcher.abort();
    tracing::debug!(history = ?location.history(), "Wizard session ended");
    Ok(())
}
