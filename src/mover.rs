//! Moves messages between the inbox and the archival label, keeping the
//! persisted bookkeeping in step.

use chrono::Utc;
use thiserror::Error;

use crate::gmail::GmailClient;
use crate::models::ArchivedMessage;
use crate::store::Store;

/// Name of the Gmail label that holds messages we have unsubscribed from.
/// Labeling instead of trashing keeps the mail recoverable.
pub const ARCHIVE_LABEL: &str = "Unsubscribed";

const INBOX: &str = "INBOX";

#[derive(Debug, Error)]
pub enum MoveError {
    #[error("Failed to resolve the archival label: {0}")]
    Label(String),
    #[error("Failed to move the message: {0}")]
    Modify(String),
    #[error("Failed to update local records: {0}")]
    Store(String),
}

/// Swaps the inbox label for the archival label on one message, then records
/// the move. The label id is re-resolved on every call rather than cached;
/// one redundant list call buys freedom from invalidation concerns.
pub async fn archive(
    client: &GmailClient,
    store: &Store,
    id: &str,
    sender: &str,
    subject: &str,
) -> Result<(), MoveError> {
    let label_id = client
        .get_or_create_label(ARCHIVE_LABEL)
        .await
        .map_err(|e| MoveError::Label(format!("{e:#}")))?;

    client
        .modify_message(id, vec![label_id], vec![INBOX.to_string()])
        .await
        .map_err(|e| MoveError::Modify(format!("{e:#}")))?;

    store
        .push_archived(ArchivedMessage {
            id: id.to_string(),
            sender: sender.to_string(),
            subject: subject.to_string(),
            archived_at: Utc::now(),
        })
        .await
        .map_err(|e| MoveError::Store(format!("{e:#}")))?;
    store
        .remove_scan_result(id)
        .await
        .map_err(|e| MoveError::Store(format!("{e:#}")))?;

    Ok(())
}

/// Reverses [`archive`]: the message goes back to the inbox and its archive
/// record is dropped. When the archival label no longer exists there is
/// nothing to remove, only the inbox label to add.
pub async fn restore(client: &GmailClient, store: &Store, id: &str) -> Result<(), MoveError> {
    let label = client
        .find_label(ARCHIVE_LABEL)
        .await
        .map_err(|e| MoveError::Label(format!("{e:#}")))?;

    let remove = match label {
        Some(label) => vec![label.id],
        None => Vec::new(),
    };
    client
        .modify_message(id, vec![INBOX.to_string()], remove)
        .await
        .map_err(|e| MoveError::Modify(format!("{e:#}")))?;

    store
        .remove_archived(id)
        .await
        .map_err(|e| MoveError::Store(format!("{e:#}")))?;

    Ok(())
}
