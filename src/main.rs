//! # Codepad - A Small Python Code Editor
//!
//! Command-line shell around the editor core: highlight a file, manage
//! the project folder, drive pip and git, and run scripts.
//!
//! ## Quick Start
//!
//! ```bash
//! # Print the highlighted markup for a file
//! cargo run -- highlight path/to/script.py --caret 10
//!
//! # Remember a project folder
//! cargo run -- project set path/to/project
//!
//! # Run a script with the configured interpreter
//! cargo run -- run path/to/script.py
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codepad_core::{
    Config, Editor, EventHandler, HighlightSession, HighlightSettings, PipAction, ToolOutput,
};
use codepad_syntax::detect_language;

/// Codepad - a small Python code editor
#[derive(Parser, Debug)]
#[command(name = "codepad")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Highlight a file and print the resulting markup
    Highlight {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Code style or TOML theme file
        #[arg(short, long)]
        theme: Option<String>,

        /// Caret character offset to map into the markup
        #[arg(long, default_value_t = 0)]
        caret: usize,
    },

    /// Show or change the project folder
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage packages with pip
    Pip {
        #[command(subcommand)]
        action: PipCommand,
    },

    /// Run git in the project folder
    Git {
        #[command(subcommand)]
        action: GitCommand,
    },

    /// Run a Python script
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    /// Remember a project folder
    Set { dir: PathBuf },
    /// Print the current project folder
    Show,
}

#[derive(Subcommand, Debug)]
enum PipCommand {
    Install { package: String },
    Uninstall { package: String },
    Upgrade { package: String },
}

impl PipCommand {
    fn split(&self) -> (PipAction, &str) {
        match self {
            PipCommand::Install { package } => (PipAction::Install, package),
            PipCommand::Uninstall { package } => (PipAction::Uninstall, package),
            PipCommand::Upgrade { package } => (PipAction::Upgrade, package),
        }
    }
}

#[derive(Subcommand, Debug)]
enum GitCommand {
    Init,
    Status,
    Pull,
    Push,
    /// Stage all changes and commit
    Commit {
        #[arg(short, long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Codepad v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Config::load_or_default(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };

    dispatch(config, args.config, args.command).await
}

/// Builds the editor and logs its events until it is dropped.
fn open_editor(config: Config, config_path: Option<PathBuf>) -> anyhow::Result<Editor> {
    let editor = Editor::new(config)?;
    let editor = match config_path {
        Some(path) => editor.with_config_path(path),
        None => editor,
    };

    let mut events = EventHandler::new(editor.subscribe());
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            tracing::debug!(?event, "Editor event");
        }
    });

    Ok(editor)
}

/// Feeds a file through a highlight session and prints the first display.
async fn highlight(
    mut config: Config,
    file: &Path,
    theme: Option<String>,
    caret: usize,
) -> anyhow::Result<()> {
    if let Some(theme) = theme {
        if theme.ends_with(".toml") {
            config.editor.theme_file = Some(PathBuf::from(theme));
        } else {
            config.editor.code_style = theme;
            config.editor.theme_file = None;
        }
    }

    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let settings = HighlightSettings::from_config(&config.editor)?;
    let input = settings.build(detect_language(file))?;

    let session = HighlightSession::spawn(input);
    let mut display = session.display();
    session.text_changed(text).await?;
    session.caret_moved(caret).await?;
    let snapshot = display.wait_for(|s| s.passes > 0).await?.clone();
    println!("{}", snapshot.display);
    eprintln!(
        "caret {} -> markup offset {}{}",
        snapshot.caret,
        snapshot.display_caret,
        if snapshot.is_markup { "" } else { " (plain text)" }
    );

    session.finish().await?;
    Ok(())
}

async fn dispatch(
    config: Config,
    config_path: Option<PathBuf>,
    command: Command,
) -> anyhow::Result<()> {
    if let Command::Highlight { file, theme, caret } = command {
        return highlight(config, &file, theme, caret).await;
    }

    let mut editor = open_editor(config, config_path)?;
    match command {
        Command::Highlight { .. } => {}
        Command::Project { action } => match action {
            ProjectAction::Set { dir } => {
                editor.set_project(&dir)?;
                println!("Project folder set to {}", dir.display());
            }
            ProjectAction::Show => match editor.project() {
                Some(dir) => println!("{}", dir.display()),
                None => println!("No project folder set"),
            },
        },
        Command::Pip { action } => {
            let (action, package) = action.split();
            report(editor.pip().run(action, package).await?);
        }
        Command::Git { action } => {
            let git = editor.git()?;
            let output = match action {
                GitCommand::Init => git.init().await?,
                GitCommand::Status => git.status().await?,
                GitCommand::Pull => git.pull().await?,
                GitCommand::Push => git.push().await?,
                GitCommand::Commit { message } => git.commit_all(&message).await?,
            };
            report(output);
        }
        Command::Run { file } => {
            editor.open_file(&file)?;
            report(editor.run_current().await?);
        }
    }
    Ok(())
}

fn report(output: ToolOutput) {
    println!("{output}");
    if !output.success() {
        tracing::warn!("Command exited with {:?}", output.status);
    }
}
