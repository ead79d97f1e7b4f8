//! NeuroNote: single-binary study notes server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use neuronote_core::NeuroNoteConfig;
use neuronote_server::{build_router, pipeline, AppState};
use neuronote_store::SqliteStore;

fn resolve_data_dir() -> PathBuf {
    std::env::var("NEURONOTE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn data_dir_arg(args: &[String]) -> PathBuf {
    args.get(2).map(PathBuf::from).unwrap_or_else(resolve_data_dir)
}

fn open_store(data_dir: &Path) -> anyhow::Result<SqliteStore> {
    let config = NeuroNoteConfig::from_env(data_dir)?;
    SqliteStore::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))
}

/// `neuronote purge`: delete every row, child tables first, and the
/// uploaded blobs.
fn purge(data_dir: &Path) -> anyhow::Result<()> {
    let store = open_store(data_dir)?;
    let report = store
        .purge_all()
        .map_err(|e| anyhow::anyhow!("Purge failed: {}", e))?;
    pipeline::remove_document_blobs(&report.documents);
    println!("Purged {}", store.db_path().display());
    println!("  users:          {}", report.users);
    println!("  documents:      {}", report.documents.len());
    println!("  notes:          {}", report.notes);
    println!("  flashcards:     {}", report.flashcards);
    println!("  chat messages:  {}", report.chat_messages);
    println!("  notebook pages: {}", report.pages);
    println!("  annotations:    {}", report.annotations);
    Ok(())
}

/// `neuronote check`: report dangling references. Exit code 1 when dirty.
fn check(data_dir: &Path) -> anyhow::Result<bool> {
    let store = open_store(data_dir)?;
    let stats = store
        .get_stats()
        .map_err(|e| anyhow::anyhow!("Could not read stats: {}", e))?;
    let report = store
        .integrity_report()
        .map_err(|e| anyhow::anyhow!("Integrity check failed: {}", e))?;

    println!("Database: {} ({:.2} MB)", stats.db_path, stats.db_size_mb);
    println!(
        "Rows: {} users, {} documents, {} notes, {} flashcards, {} messages, {} pages, {} annotations",
        stats.users,
        stats.documents,
        stats.notes,
        stats.flashcards,
        stats.chat_messages,
        stats.pages,
        stats.annotations
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.is_clean() {
        println!("OK: no dangling references");
    } else {
        println!("FAILED: dangling references found");
    }
    Ok(report.is_clean())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "purge" | "--purge" => {
                purge(&data_dir_arg(&args))?;
                return Ok(());
            }
            "check" | "--check" => {
                let clean = check(&data_dir_arg(&args))?;
                std::process::exit(if clean { 0 } else { 1 });
            }
            "--help" | "-h" | "help" => {
                println!("NeuroNote: study notes server");
                println!();
                println!("Usage: neuronote [command]");
                println!();
                println!("Commands:");
                println!("  (none)                   Start the server");
                println!("  purge [data-dir]         Delete all users and content");
                println!("  check [data-dir]         Report dangling references");
                println!("  help                     Show this help message");
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'neuronote help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = NeuroNoteConfig::from_env(&data_dir)?;
    let port = config.port;

    let state = AppState::open(config)
        .map_err(|e| anyhow::anyhow!("Failed to initialise: {}", e))?;
    let app = build_router(Arc::new(state));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("NeuroNote server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
