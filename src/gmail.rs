use crate::models;
use anyhow::{Context, Result};
use google_gmail1::Gmail;
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;

/// Thin wrapper over the Gmail hub exposing the handful of calls the
/// scanner and the mover need.
#[derive(Clone)]
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
}

impl GmailClient {
    pub fn new(hub: Gmail<HttpsConnector<HttpConnector>>) -> Self {
        Self { hub }
    }

    pub async fn list_labels(&self) -> Result<Vec<models::Label>> {
        let (_, label_list) = self
            .hub
            .users()
            .labels_list("me")
            .doit()
            .await
            .context("Failed to list labels")?;

        let labels = label_list
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| models::Label {
                id: l.id.unwrap_or_default(),
                name: l.name.unwrap_or_default(),
            })
            .collect();

        Ok(labels)
    }

    /// Exact, case-sensitive lookup by label name.
    pub async fn find_label(&self, name: &str) -> Result<Option<models::Label>> {
        let labels = self.list_labels().await?;
        Ok(labels.into_iter().find(|l| l.name == name))
    }

    pub async fn create_label(&self, name: &str) -> Result<models::Label> {
        let req = google_gmail1::api::Label {
            name: Some(name.to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            message_list_visibility: Some("show".to_string()),
            ..Default::default()
        };
        let (_, label) = self
            .hub
            .users()
            .labels_create(req, "me")
            .doit()
            .await
            .context(format!("Failed to create label {name}"))?;

        Ok(models::Label {
            id: label.id.unwrap_or_default(),
            name: label.name.unwrap_or_default(),
        })
    }

    /// Resolves a label id by name, creating the label on first use. The id
    /// is deliberately not cached; every move re-resolves it.
    pub async fn get_or_create_label(&self, name: &str) -> Result<String> {
        if let Some(label) = self.find_label(name).await? {
            return Ok(label.id);
        }
        Ok(self.create_label(name).await?.id)
    }

    pub async fn list_message_ids(&self, query: &str, max_results: u32) -> Result<Vec<String>> {
        let (_, message_list) = self
            .hub
            .users()
            .messages_list("me")
            .q(query)
            .max_results(max_results)
            .doit()
            .await
            .context("Failed to list messages")?;

        let ids = message_list
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| m.id)
            .collect();

        Ok(ids)
    }

    /// Fetches one message with the full payload and pulls out the headers
    /// the scanner cares about plus the HTML body.
    pub async fn get_message(&self, id: &str) -> Result<models::FetchedMessage> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .doit()
            .await
            .context(format!("Failed to get message {id}"))?;

        let mut fetched = models::FetchedMessage {
            id: msg.id.unwrap_or_else(|| id.to_string()),
            ..Default::default()
        };

        if let Some(payload) = &msg.payload {
            if let Some(headers) = &payload.headers {
                for header in headers {
                    // Header names are matched case-insensitively; senders
                    // vary the capitalization of List-Unsubscribe freely.
                    let Some(name) = header.name.as_deref() else {
                        continue;
                    };
                    if name.eq_ignore_ascii_case("list-unsubscribe") {
                        fetched.list_unsubscribe = header.value.clone();
                    } else if name.eq_ignore_ascii_case("from") {
                        fetched.sender = header.value.clone();
                    } else if name.eq_ignore_ascii_case("subject") {
                        fetched.subject = header.value.clone();
                    }
                }
            }
            fetched.body_html = extract_body(payload, "text/html");
        }

        Ok(fetched)
    }

    /// One combined add/remove of label ids on a message. Gmail applies the
    /// request atomically from the caller's point of view.
    pub async fn modify_message(
        &self,
        id: &str,
        add_label_ids: Vec<String>,
        remove_label_ids: Vec<String>,
    ) -> Result<()> {
        let req = google_gmail1::api::ModifyMessageRequest {
            add_label_ids: (!add_label_ids.is_empty()).then_some(add_label_ids),
            remove_label_ids: (!remove_label_ids.is_empty()).then_some(remove_label_ids),
        };
        self.hub
            .users()
            .messages_modify(req, "me", id)
            .doit()
            .await
            .context(format!("Failed to modify labels on message {id}"))?;
        Ok(())
    }
}

/// Recursively finds the first body of the given mime type and decodes it.
/// Gmail ships body data base64url-encoded, with some variation in padding.
fn extract_body(part: &google_gmail1::api::MessagePart, mime_type: &str) -> Option<String> {
    if let Some(mime) = &part.mime_type {
        if mime == mime_type {
            if let Some(body) = &part.body {
                if let Some(data) = &body.data {
                    use base64::{Engine as _, engine::general_purpose};
                    let data_str = String::from_utf8_lossy(data);
                    let trimmed = data_str.trim();

                    let decoded = general_purpose::URL_SAFE_NO_PAD
                        .decode(trimmed)
                        .or_else(|_| general_purpose::URL_SAFE.decode(trimmed))
                        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(trimmed))
                        .or_else(|_| general_purpose::STANDARD.decode(trimmed));

                    return match decoded {
                        Ok(bytes) => String::from_utf8(bytes).ok(),
                        // Some responses already carry raw content here.
                        Err(_) => String::from_utf8(data.clone()).ok(),
                    };
                }
            }
        }
    }

    if let Some(parts) = &part.parts {
        for p in parts {
            if let Some(body) = extract_body(p, mime_type) {
                return Some(body);
            }
        }
    }

    None
}
