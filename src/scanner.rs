//! Inbox scan: list inbox messages, fetch each one sequentially, keep the
//! ones carrying a usable unsubscribe action, persist the result set.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::auth::{GmailAuthenticator, SCOPES};
use crate::extract;
use crate::gmail::GmailClient;
use crate::models::Candidate;
use crate::mover::ARCHIVE_LABEL;
use crate::store::Store;

/// Upper bound on how many inbox messages one scan inspects.
pub const PAGE_SIZE: u32 = 50;

/// Failures that abort a scan. Per-message fetch failures are not here; the
/// message is logged and skipped and the scan continues.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Failed to list inbox messages: {0}")]
    List(String),
    #[error("Failed to save scan results: {0}")]
    Persist(String),
}

/// Streamed to the UI while a scan runs. Delivery is best effort; a closed
/// or full channel never fails the scan.
#[derive(Debug, Clone)]
pub enum ScanProgress {
    Authenticating,
    Listing,
    Fetching {
        current: usize,
        total: usize,
        percent: u8,
    },
}

fn notify(progress: &mpsc::Sender<ScanProgress>, update: ScanProgress) {
    if progress.try_send(update).is_err() {
        debug!("progress listener not receiving, update dropped");
    }
}

fn scan_query() -> String {
    // Messages we already moved out stay out of subsequent scans.
    format!("in:inbox -label:{ARCHIVE_LABEL}")
}

/// Runs one scan end to end and persists the result set, replacing the
/// previous one. On error nothing is persisted; whatever a prior scan stored
/// stays untouched.
pub async fn scan(
    auth: &GmailAuthenticator,
    client: &GmailClient,
    store: &Store,
    progress: mpsc::Sender<ScanProgress>,
) -> Result<Vec<Candidate>, ScanError> {
    notify(&progress, ScanProgress::Authenticating);
    auth.token(SCOPES)
        .await
        .map_err(|e| ScanError::Auth(e.to_string()))?;

    notify(&progress, ScanProgress::Listing);
    let ids = client
        .list_message_ids(&scan_query(), PAGE_SIZE)
        .await
        .map_err(|e| ScanError::List(format!("{e:#}")))?;

    let total = ids.len();
    let mut results = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        match client.get_message(id).await {
            Ok(fetched) => {
                if let Some(candidate) = assemble_candidate(fetched) {
                    results.push(candidate);
                }
            }
            Err(e) => {
                warn!(message_id = %id, error = %format!("{e:#}"), "skipping message after fetch failure");
            }
        }

        notify(
            &progress,
            ScanProgress::Fetching {
                current: i + 1,
                total,
                percent: ((i + 1) * 100 / total) as u8,
            },
        );
    }

    store
        .replace_scan_results(&results)
        .await
        .map_err(|e| ScanError::Persist(format!("{e:#}")))?;

    Ok(results)
}

/// Turns a fetched message into a candidate if it offers any unsubscribe
/// action. The `List-Unsubscribe` header is authoritative; the HTML body is
/// only consulted when the header is absent or yields nothing.
fn assemble_candidate(fetched: crate::models::FetchedMessage) -> Option<Candidate> {
    let mut actions = fetched
        .list_unsubscribe
        .as_deref()
        .map(extract::parse_header)
        .unwrap_or_default();

    if actions.is_empty() {
        if let Some(html) = &fetched.body_html {
            actions = extract::scan_html(html);
        }
    }

    let actions = extract::dedup_actions(actions);
    if actions.is_empty() {
        return None;
    }

    Some(Candidate {
        id: fetched.id,
        sender: fetched.sender.unwrap_or_else(|| "Unknown Sender".to_string()),
        subject: fetched.subject.unwrap_or_else(|| "No Subject".to_string()),
        actions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FetchedMessage, UnsubscribeAction};

    fn fetched(header: Option<&str>, html: Option<&str>) -> FetchedMessage {
        FetchedMessage {
            id: "m1".into(),
            sender: Some("News <news@example.com>".into()),
            subject: Some("Weekly digest".into()),
            list_unsubscribe: header.map(str::to_string),
            body_html: html.map(str::to_string),
        }
    }

    #[test]
    fn header_actions_win_over_body_links() {
        let candidate = assemble_candidate(fetched(
            Some("<https://a.example/u>"),
            Some(r#"<a href="https://b.example/unsubscribe">Unsubscribe</a>"#),
        ))
        .unwrap();
        assert_eq!(
            candidate.actions,
            vec![UnsubscribeAction::Web {
                url: "https://a.example/u".into()
            }]
        );
    }

    #[test]
    fn body_links_back_up_a_missing_header() {
        let candidate = assemble_candidate(fetched(
            None,
            Some(r#"<a href="https://b.example/unsubscribe">Unsubscribe</a>"#),
        ))
        .unwrap();
        assert_eq!(
            candidate.actions,
            vec![UnsubscribeAction::Web {
                url: "https://b.example/unsubscribe".into()
            }]
        );
    }

    #[test]
    fn duplicate_header_entries_collapse_in_the_candidate() {
        let candidate =
            assemble_candidate(fetched(Some("<https://a.example/u>, <https://a.example/u>"), None))
                .unwrap();
        assert_eq!(candidate.actions.len(), 1);
    }

    #[test]
    fn message_without_any_action_is_dropped() {
        assert!(assemble_candidate(fetched(None, Some("<p>plain newsletter</p>"))).is_none());
        assert!(assemble_candidate(fetched(Some("garbage"), None)).is_none());
    }

    #[test]
    fn missing_sender_and_subject_get_placeholders() {
        let msg = FetchedMessage {
            id: "m9".into(),
            list_unsubscribe: Some("<mailto:u@example.com>".into()),
            ..Default::default()
        };
        let candidate = assemble_candidate(msg).unwrap();
        assert_eq!(candidate.sender, "Unknown Sender");
        assert_eq!(candidate.subject, "No Subject");
    }
}
