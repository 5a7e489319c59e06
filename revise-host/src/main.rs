//! revise — apply review sessions to text documents from the command line.
//!
//! Each invocation loads `config.toml`, installs the `tracing` subscriber,
//! opens the state database, and runs one command against one document
//! through a [`Workspace`] over the filesystem.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use revise_core::preview::{change_stats, unified_diff};
use revise_host::{
    init_tracing, Config, FsDocumentHost, HostError, HostResult, SqliteStateStore, Workspace,
};

#[derive(Parser, Debug)]
#[command(name = "revise", about, long_about = None)]
struct Cli {
    /// Load configuration from a specific file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Directory document paths are resolved against
    #[arg(short = 'r', long = "root", value_name = "DIR", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show progress for a document
    Status { document: String },
    /// Load a review session (JSON file) for a document, discarding old decisions
    Load { document: String, session: PathBuf },
    /// List findings with their decision and a preview
    List { document: String },
    /// Accept a finding, optionally choosing one of its patch options
    Accept {
        document: String,
        index: usize,
        #[arg(long = "option", value_name = "N")]
        option: Option<usize>,
    },
    /// Ignore a finding
    Ignore { document: String, index: usize },
    /// Print the next undecided finding index
    Next {
        document: String,
        #[arg(long = "after", default_value_t = 0)]
        after: usize,
    },
    /// Show a unified diff between the document and its revised text
    Diff { document: String },
    /// Write the revised text over the document
    Write { document: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match &cli.config_file {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    if let Err(e) = init_tracing(&config.log_filter) {
        eprintln!("revise: logging disabled: {e}");
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("revise: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> HostResult<()> {
    let store = SqliteStateStore::open(&config.database_path).await?;
    let mut ws = Workspace::new(FsDocumentHost::new(cli.root), store)
        .with_snippet_context(config.snippet_context_chars);

    match cli.command {
        Command::Status { document } => {
            let status = ws.open(&document).await?;
            if !status.has_session {
                println!("{document}: no review session loaded");
                return Ok(());
            }
            let p = status.progress;
            println!(
                "{document}: {} findings, {} accepted, {} ignored, {} pending",
                status.findings, p.accepted, p.ignored, p.pending
            );
        }
        Command::Load { document, session } => {
            let raw = tokio::fs::read_to_string(&session)
                .await
                .map_err(|e| HostError::io(session.display().to_string(), e))?;
            ws.open(&document).await?;
            let status = ws.load_session(&document, &raw).await?;
            println!("{document}: loaded {} findings", status.findings);
        }
        Command::List { document } => {
            ws.open(&document).await?;
            list_findings(&ws, &document)?;
        }
        Command::Accept { document, index, option } => {
            ws.open(&document).await?;
            let accepted = match option {
                Some(option) => ws.accept_option(&document, index, option).await?,
                None => ws.accept(&document, index).await?,
            };
            if accepted.anchor.is_fallback() {
                println!("finding {index}: span not found, applied at 'from'");
            }
            println!("finding {index}: accepted");
        }
        Command::Ignore { document, index } => {
            ws.open(&document).await?;
            ws.ignore(&document, index).await?;
            println!("finding {index}: ignored");
        }
        Command::Next { document, after } => {
            ws.open(&document).await?;
            let doc = ws.document(&document).ok_or_else(|| HostError::NotOpen(document.clone()))?;
            let len = doc.session.as_ref().map_or(0, |s| s.review.len());
            match doc.state.next_undecided(after, len) {
                Some(index) => println!("{index}"),
                None => println!("all findings decided"),
            }
        }
        Command::Diff { document } => {
            ws.open(&document).await?;
            let doc = ws.document(&document).ok_or_else(|| HostError::NotOpen(document.clone()))?;
            let revised = doc.effective_text();
            let stats = change_stats(&doc.original, &revised);
            print!("{}", unified_diff(&doc.original, &revised, &document));
            println!("{} lines removed, {} lines inserted", stats.removed_lines, stats.inserted_lines);
        }
        Command::Write { document } => {
            ws.open(&document).await?;
            let text = ws.write_back(&document).await?;
            println!("{document}: wrote {} bytes", text.len());
        }
    }
    Ok(())
}

fn list_findings(ws: &Workspace<FsDocumentHost, SqliteStateStore>, path: &str) -> HostResult<()> {
    let doc = ws.document(path).ok_or_else(|| HostError::NotOpen(path.to_owned()))?;
    let loaded = doc.session.as_ref().ok_or_else(|| HostError::NoSession(path.to_owned()))?;

    for (index, finding) in loaded.review.session.findings.iter().enumerate() {
        let severity = finding.severity.as_deref().unwrap_or("-");
        println!("[{index}] {} ({severity}) {}", doc.state.decision(index), finding.comment);
        for (n, option) in loaded.review.patch_options(index).iter().enumerate() {
            println!("      option {n}: {} -> {:?}", option.label, option.patch.to);
        }
        if let Some(s) = ws.snippet_for(path, index)? {
            println!("      {}[{}]{}", s.before, s.matched, s.after);
        }
    }
    Ok(())
}
