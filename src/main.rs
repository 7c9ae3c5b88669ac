use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

mod natter;
mod settings;

use natter::models::{NoticeLevel, NoticeStore, Thread};
use natter::repositories::{HttpThreadRepository, InMemoryThreadRepository, ThreadRepository};
use natter::services::preprocessor::{self, SelectedFile, StagedAttachment};
use natter::services::{
    HttpCompletionClient, HttpFileStorage, HttpImageGenerator, HttpTextExtractor,
    HttpVisionAnalyzer,
};
use natter::views::{format_file_size, is_image_url, render_transcript};
use natter::{Collaborators, SendController};
use settings::{GeneralSettingsJsonRepository, GeneralSettingsModel, GeneralSettingsRepository};

/// Terminal client for a hosted AI chat backend.
#[derive(Parser, Debug)]
#[command(name = "natter", version, about)]
struct Cli {
    /// Base URL of the backend API
    #[arg(long, env = "NATTER_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token sent with backend requests
    #[arg(long, env = "NATTER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds for non-streaming calls
    #[arg(long, env = "NATTER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Disable incremental streaming of replies
    #[arg(long)]
    no_stream: bool,

    /// Keep threads in memory instead of the backend store
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Structured logging on stderr so the transcript stays on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("NATTER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("natter=info")),
        )
        .with_writer(io::stderr)
        .init();

    info!("Starting natter");

    let mut settings = load_settings().await;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        settings.request_timeout_secs = timeout_secs;
    }
    if cli.no_stream {
        settings.streaming_enabled = false;
    }

    let repo: Arc<dyn ThreadRepository> = if cli.in_memory {
        Arc::new(InMemoryThreadRepository::new())
    } else {
        Arc::new(HttpThreadRepository::new(
            &settings.base_url,
            cli.api_key.clone(),
            settings.request_timeout_secs,
        )?)
    };

    let collaborators = Collaborators {
        completion: Arc::new(HttpCompletionClient::new(
            &settings.base_url,
            cli.api_key.clone(),
        )?),
        storage: Arc::new(HttpFileStorage::new(
            &settings.base_url,
            cli.api_key.clone(),
            settings.request_timeout_secs,
        )?),
        extraction: Arc::new(HttpTextExtractor::new(
            &settings.base_url,
            cli.api_key.clone(),
            settings.request_timeout_secs,
        )?),
        vision: Arc::new(HttpVisionAnalyzer::new(
            &settings.base_url,
            cli.api_key.clone(),
            settings.request_timeout_secs,
        )?),
        image_gen: Arc::new(HttpImageGenerator::new(
            &settings.base_url,
            cli.api_key,
            settings.request_timeout_secs,
        )?),
    };

    let notices = NoticeStore::new();
    let reply_open = Arc::new(AtomicBool::new(false));
    let controller = Arc::new(
        SendController::new(repo, collaborators, notices.clone())
            .with_streaming(settings.streaming_enabled)
            .with_delta_sink(delta_printer(reply_open.clone())),
    );

    run_repl(controller, notices, reply_open).await
}

async fn load_settings() -> GeneralSettingsModel {
    let repo = match GeneralSettingsJsonRepository::new() {
        Ok(repo) => repo,
        Err(error) => {
            warn!(error = %error, "Settings path unavailable, using defaults");
            return GeneralSettingsModel::default();
        }
    };
    match repo.load().await {
        Ok(settings) => settings,
        Err(error) => {
            warn!(error = %error, "Failed to load settings, using defaults");
            GeneralSettingsModel::default()
        }
    }
}

/// Prints assistant output as it arrives. The first chunk opens the reply
/// line; a first chunk that is a bare image URL becomes a labeled link line.
fn delta_printer(reply_open: Arc<AtomicBool>) -> impl Fn(&str) + Send + Sync + 'static {
    move |chunk| {
        let mut out = io::stdout().lock();
        if !reply_open.swap(true, Ordering::SeqCst) {
            if is_image_url(chunk) {
                let _ = write!(out, "assistant> [image] {}", chunk);
                let _ = out.flush();
                return;
            }
            let _ = write!(out, "assistant> ");
        }
        let _ = write!(out, "{}", chunk);
        let _ = out.flush();
    }
}

async fn run_repl(
    controller: Arc<SendController>,
    notices: NoticeStore,
    reply_open: Arc<AtomicBool>,
) -> Result<()> {
    println!("natter ready. Type a message to chat.");
    print_usage();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut listing: Vec<Thread> = Vec::new();
    let mut pending_attachment: Option<StagedAttachment> = None;

    loop {
        print_prompt(&pending_attachment);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = match command.split_once(' ') {
                Some((name, arg)) => (name, arg.trim()),
                None => (command, ""),
            };
            match name {
                "quit" => break,
                "stop" => {
                    if !controller.stop() {
                        println!("Nothing to stop.");
                    }
                }
                "new" => {
                    controller.new_chat();
                    println!("Started a new chat.");
                }
                "threads" => match controller.list_threads().await {
                    Ok(threads) => {
                        listing = threads;
                        print_listing(&listing);
                    }
                    Err(error) => eprintln!("error: {:#}", error),
                },
                "search" => match controller.search_threads(arg).await {
                    Ok(threads) => {
                        listing = threads;
                        print_listing(&listing);
                    }
                    Err(error) => eprintln!("error: {:#}", error),
                },
                "open" => {
                    let selected = arg
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|index| listing.get(index));
                    match selected {
                        Some(thread) => match controller.open_thread(thread).await {
                            Ok(()) => {
                                let rendered =
                                    render_transcript(&controller.transcript_snapshot());
                                if !rendered.is_empty() {
                                    println!("{}", rendered);
                                }
                            }
                            Err(error) => eprintln!("error: {:#}", error),
                        },
                        None => println!("Usage: /open <n>  (run /threads first)"),
                    }
                }
                "rename" => {
                    if arg.is_empty() {
                        println!("Usage: /rename <name>");
                    } else {
                        match controller.rename_active(arg).await {
                            Ok(()) => println!("Renamed."),
                            Err(error) => eprintln!("error: {:#}", error),
                        }
                    }
                }
                "delete" => match controller.delete_active().await {
                    Ok(()) => println!("Thread deleted."),
                    Err(error) => eprintln!("error: {:#}", error),
                },
                "files" => match controller.list_active_files().await {
                    Ok(files) if files.is_empty() => println!("No files."),
                    Ok(files) => {
                        for file in files {
                            println!("{}  [{}]  {}", file.name, file.media_type, file.url);
                        }
                    }
                    Err(error) => eprintln!("error: {:#}", error),
                },
                "attach" => {
                    if arg.is_empty() {
                        println!("Usage: /attach <path>");
                    } else {
                        match stage_attachment(Path::new(arg)).await {
                            Ok(staged) => {
                                println!(
                                    "Attached {} ({}).",
                                    staged.file.name,
                                    format_file_size(staged.file.size_bytes())
                                );
                                pending_attachment = Some(staged);
                            }
                            Err(error) => eprintln!("error: {:#}", error),
                        }
                    }
                }
                "detach" => {
                    pending_attachment = None;
                    println!("Attachment cleared.");
                }
                _ => print_usage(),
            }
            print_notices(&notices);
            continue;
        }

        // Plain line: send it on a task so /stop stays available while the
        // reply streams.
        let staged = pending_attachment.take();
        let send_controller = controller.clone();
        let send_notices = notices.clone();
        let send_reply_open = reply_open.clone();
        let _ = tokio::spawn(async move {
            send_controller.send(&line, staged).await;
            if send_reply_open.swap(false, Ordering::SeqCst) {
                println!();
            }
            print_notices(&send_notices);
        });
    }

    Ok(())
}

async fn stage_attachment(path: &Path) -> Result<StagedAttachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let media_type = preprocessor::media_type_for_path(path);
    let staged = preprocessor::stage(SelectedFile::new(name, media_type, bytes))?;
    Ok(staged)
}

fn print_prompt(pending: &Option<StagedAttachment>) {
    let mut out = io::stdout().lock();
    match pending {
        Some(staged) => {
            let _ = write!(out, "[{}] > ", staged.file.name);
        }
        None => {
            let _ = write!(out, "> ");
        }
    }
    let _ = out.flush();
}

fn print_listing(threads: &[Thread]) {
    if threads.is_empty() {
        println!("No threads.");
        return;
    }
    for (index, thread) in threads.iter().enumerate() {
        println!("{:>3}. {}", index + 1, thread.name);
    }
}

fn print_notices(notices: &NoticeStore) {
    for notice in notices.drain() {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{}] {}: {}", tag, notice.title, notice.detail);
    }
}

fn print_usage() {
    println!(
        "Commands: /threads /new /open <n> /rename <name> /delete /files \
         /attach <path> /detach /search <query> /stop /quit"
    );
}
