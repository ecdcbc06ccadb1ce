mod auth;
mod config;
mod extract;
mod gmail;
mod models;
mod mover;
mod scanner;
mod store;
mod ui;

use crate::config::{Config, matches_key};
use crate::gmail::GmailClient;
use crate::models::{Candidate, UnsubscribeAction};
use crate::scanner::{ScanError, ScanProgress};
use crate::store::Store;
use crate::ui::View;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use google_gmail1::Gmail;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Final word from a spawned scan or move task, drained by the event loop.
enum TaskOutcome {
    ScanFinished(Result<Vec<Candidate>, ScanError>),
    Archived {
        id: String,
        result: Result<(), String>,
    },
    Restored {
        result: Result<(), String>,
    },
    /// Fired a moment after a successful restore so provider-side label
    /// changes have settled before we rescan.
    RescanDue,
}

fn setup_logging(debug: bool) {
    use std::fs::OpenOptions;

    let default = if debug { "info,gunsub=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("gunsub.log")
        .ok();

    // Without a writable log file we stay silent; stderr would tear up the TUI.
    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    }
}

fn spawn_scan(
    auth: &auth::GmailAuthenticator,
    client: &GmailClient,
    store: &Store,
    progress_tx: &mpsc::Sender<ScanProgress>,
    outcome_tx: &mpsc::Sender<TaskOutcome>,
) {
    let auth = auth.clone();
    let client = client.clone();
    let store = store.clone();
    let progress_tx = progress_tx.clone();
    let outcome_tx = outcome_tx.clone();
    tokio::spawn(async move {
        let result = scanner::scan(&auth, &client, &store, progress_tx).await;
        let _ = outcome_tx.send(TaskOutcome::ScanFinished(result)).await;
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let debug_logging = std::env::args().any(|arg| arg == "--debug");
    setup_logging(debug_logging);

    if std::env::args().any(|arg| arg == "--reset-token") {
        auth::RingStorage.clear_token().await?;
        println!("Token cleared. Restart without --reset-token to re-authenticate.");
        return Ok(());
    }

    let config = Config::load();
    let store = Store::new("sqlite:gunsub.db?mode=rwc").await?;
    store.run_migrations().await?;

    // Setup terminal early
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut ui_state = ui::UIState::default();

    // Show whatever the previous scan found while this session warms up.
    ui_state.candidates = store.scan_results().await?;
    ui_state.ignored = store.ignored_senders().await?;
    ui_state.archived = store.archived_messages().await?;

    let (auth_url_tx, mut auth_url_rx) = mpsc::channel::<String>(1);
    let (done_tx, mut done_rx) = mpsc::channel::<bool>(1);
    let (progress_tx, mut progress_rx) = mpsc::channel::<ScanProgress>(32);
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<TaskOutcome>(16);

    let secret = auth::Authenticator::load_secret("credentials.json").await?;
    let authenticator =
        auth::Authenticator::authenticate(secret, auth::TuiDelegate { tx: auth_url_tx }).await?;

    let auth_clone = authenticator.clone();
    tokio::spawn(async move {
        if auth_clone.token(auth::SCOPES).await.is_ok() {
            let _ = done_tx.send(true).await;
        }
    });

    let mut authenticated = false;
    let mut gmail_client: Option<GmailClient> = None;

    loop {
        // Check for auth messages
        while let Ok(url) = auth_url_rx.try_recv() {
            ui_state.auth_url = Some(url);
            ui_state.mode = ui::UIMode::Authentication;
        }

        if !authenticated {
            if let Ok(true) = done_rx.try_recv() {
                authenticated = true;
                ui_state.mode = ui::UIMode::Browsing;
                ui_state.auth_url = None;

                let hub = Gmail::new(
                    hyper::Client::builder().build(
                        hyper_rustls::HttpsConnectorBuilder::new()
                            .with_native_roots()?
                            .https_only()
                            .enable_http1()
                            .build(),
                    ),
                    authenticator.clone(),
                );
                gmail_client = Some(GmailClient::new(hub));
            }
        }

        // Drain scan progress; only the latest update matters for display.
        while let Ok(update) = progress_rx.try_recv() {
            ui_state.status_message = Some(match update {
                ScanProgress::Authenticating => "Authenticating…".to_string(),
                ScanProgress::Listing => "Listing inbox messages…".to_string(),
                ScanProgress::Fetching {
                    current,
                    total,
                    percent,
                } => format!("Scanning message {current} of {total} ({percent}%)"),
            });
        }

        while let Ok(outcome) = outcome_rx.try_recv() {
            match outcome {
                TaskOutcome::ScanFinished(Ok(results)) => {
                    ui_state.scanning = false;
                    ui_state.status_message = Some(if results.is_empty() {
                        "No unsubscribable newsletters found.".to_string()
                    } else {
                        format!("Found {} potential newsletter(s)", results.len())
                    });
                    ui_state.candidates = results;
                    ui_state.clamp_selections();
                }
                TaskOutcome::ScanFinished(Err(e)) => {
                    ui_state.scanning = false;
                    // Rendered verbatim; the previously persisted result set
                    // stays on screen untouched.
                    ui_state.status_message = Some(e.to_string());
                }
                TaskOutcome::Archived { id, result } => match result {
                    Ok(()) => {
                        tracing::info!(message_id = %id, "message archived");
                        ui_state.candidates = store.scan_results().await?;
                        ui_state.archived = store.archived_messages().await?;
                        ui_state.clamp_selections();
                        ui_state.status_message =
                            Some(format!("Moved to {}", mover::ARCHIVE_LABEL));
                    }
                    Err(message) => ui_state.status_message = Some(message),
                },
                TaskOutcome::Restored { result } => match result {
                    Ok(()) => {
                        ui_state.archived = store.archived_messages().await?;
                        ui_state.clamp_selections();
                        ui_state.status_message = Some("Restored to inbox".to_string());

                        let outcome_tx = outcome_tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_secs(2)).await;
                            let _ = outcome_tx.send(TaskOutcome::RescanDue).await;
                        });
                    }
                    Err(message) => ui_state.status_message = Some(message),
                },
                TaskOutcome::RescanDue => {
                    if !ui_state.scanning {
                        if let Some(client) = &gmail_client {
                            ui_state.scanning = true;
                            spawn_scan(&authenticator, client, &store, &progress_tx, &outcome_tx);
                        }
                    }
                }
            }
        }

        terminal.draw(|f| ui::render(f, &mut ui_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            // Only handle keys if authenticated or to quit
            if !authenticated && key.code != KeyCode::Char('q') {
                continue;
            }

            match ui_state.mode {
                ui::UIMode::Authentication => {
                    if key.code == KeyCode::Char('q') {
                        break;
                    }
                }
                ui::UIMode::Browsing => {
                    if matches_key(key, &config.keybindings.quit) {
                        break;
                    }

                    if matches_key(key, &config.keybindings.next_view) {
                        ui_state.view = ui_state.view.next();
                        ui_state.status_message = None;
                    } else if matches_key(key, &config.keybindings.prev_view) {
                        ui_state.view = ui_state.view.prev();
                        ui_state.status_message = None;
                    } else if matches_key(key, &config.keybindings.move_down) {
                        ui_state.move_selection(1);
                    } else if matches_key(key, &config.keybindings.move_up) {
                        ui_state.move_selection(-1);
                    } else if ui_state.view == View::Newsletters
                        && matches_key(key, &config.keybindings.scan)
                    {
                        if !ui_state.scanning {
                            if let Some(client) = &gmail_client {
                                ui_state.scanning = true;
                                ui_state.status_message = Some("Scanning inbox…".to_string());
                                spawn_scan(
                                    &authenticator,
                                    client,
                                    &store,
                                    &progress_tx,
                                    &outcome_tx,
                                );
                            }
                        }
                    } else if ui_state.view == View::Newsletters
                        && matches_key(key, &config.keybindings.unsubscribe)
                    {
                        // The ignore list decides which entry is selected, so
                        // refresh it from the store before acting.
                        ui_state.ignored = store.ignored_senders().await?;
                        ui_state.clamp_selections();

                        if let Some(candidate) = ui_state.selected_candidate().cloned() {
                            match candidate.preferred_action().cloned() {
                                Some(UnsubscribeAction::Web { url }) => {
                                    if let Err(e) = open::that(&url) {
                                        ui_state.status_message =
                                            Some(format!("Could not open browser: {e}"));
                                    } else {
                                        ui_state.status_message =
                                            Some("Opening unsubscribe page…".to_string());
                                        if let Some(client) = &gmail_client {
                                            let client = client.clone();
                                            let store_task = store.clone();
                                            let outcome_tx = outcome_tx.clone();
                                            let (id, sender, subject) = (
                                                candidate.id.clone(),
                                                candidate.sender.clone(),
                                                candidate.subject.clone(),
                                            );
                                            tokio::spawn(async move {
                                                let result = mover::archive(
                                                    &client,
                                                    &store_task,
                                                    &id,
                                                    &sender,
                                                    &subject,
                                                )
                                                .await
                                                .map_err(|e| e.to_string());
                                                let _ = outcome_tx
                                                    .send(TaskOutcome::Archived { id, result })
                                                    .await;
                                            });
                                        }
                                    }
                                }
                                Some(UnsubscribeAction::Mail { url }) => {
                                    // Mail-only unsubscribe: open the compose
                                    // window but leave the message in place.
                                    if let Err(e) = open::that(&url) {
                                        ui_state.status_message =
                                            Some(format!("Could not open mail client: {e}"));
                                    } else {
                                        ui_state.status_message = Some(
                                            "Opened mail client; send the message to unsubscribe"
                                                .to_string(),
                                        );
                                    }
                                }
                                Some(UnsubscribeAction::ClickToTrigger) => {
                                    ui_state.status_message = Some(
                                        "This sender can only be unsubscribed from the Gmail page"
                                            .to_string(),
                                    );
                                }
                                None => {
                                    ui_state.status_message = Some(
                                        "No actionable unsubscribe link found for this email"
                                            .to_string(),
                                    );
                                }
                            }
                        }
                    } else if ui_state.view == View::Newsletters
                        && matches_key(key, &config.keybindings.ignore_sender)
                    {
                        if let Some(candidate) = ui_state.selected_candidate().cloned() {
                            store.add_ignored_sender(&candidate.sender).await?;
                            ui_state.ignored = store.ignored_senders().await?;
                            ui_state.clamp_selections();
                            ui_state.status_message =
                                Some(format!("Ignoring {}", candidate.sender));
                        }
                    } else if ui_state.view == View::Archived
                        && matches_key(key, &config.keybindings.restore)
                    {
                        if let Some(record) = ui_state.selected_archived_record() {
                            if let Some(client) = &gmail_client {
                                let id = record.id.clone();
                                let client = client.clone();
                                let store_task = store.clone();
                                let outcome_tx = outcome_tx.clone();
                                ui_state.status_message = Some("Restoring…".to_string());
                                tokio::spawn(async move {
                                    let result = mover::restore(&client, &store_task, &id)
                                        .await
                                        .map_err(|e| e.to_string());
                                    let _ = outcome_tx
                                        .send(TaskOutcome::Restored { result })
                                        .await;
                                });
                            }
                        }
                    } else if ui_state.view == View::Ignored
                        && matches_key(key, &config.keybindings.unignore)
                    {
                        if let Some(sender) = ui_state.selected_ignored_sender().cloned() {
                            store.remove_ignored_sender(&sender).await?;
                            ui_state.ignored = store.ignored_senders().await?;
                            ui_state.clamp_selections();
                            ui_state.status_message =
                                Some(format!("No longer ignoring {sender}"));
                        }
                    }
                }
            }
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    Ok(())
}
