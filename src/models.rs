use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One way to get off a sender's list.
///
/// The webmail UI sometimes carries an unsubscribe control that is not a
/// link; that case is its own variant rather than a sentinel URL so callers
/// cannot mistake it for something openable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnsubscribeAction {
    /// An http/https unsubscribe page, opened in the browser.
    Web { url: String },
    /// A mailto: address that accepts unsubscribe requests.
    Mail { url: String },
    /// A control that can only be activated from the webmail page itself.
    ClickToTrigger,
}

impl UnsubscribeAction {
    /// Classifies a URI by scheme. Anything that is not mailto/http/https is
    /// not an unsubscribe action.
    pub fn from_uri(uri: &str) -> Option<Self> {
        if uri.starts_with("http://") || uri.starts_with("https://") {
            Some(UnsubscribeAction::Web {
                url: uri.to_string(),
            })
        } else if uri.starts_with("mailto:") {
            Some(UnsubscribeAction::Mail {
                url: uri.to_string(),
            })
        } else {
            None
        }
    }

}

/// A scanned inbox message carrying at least one unsubscribe action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub actions: Vec<UnsubscribeAction>,
}

impl Candidate {
    /// The action the UI should take on "unsubscribe": a web link beats a
    /// mail address, which beats a click-only webmail control.
    pub fn preferred_action(&self) -> Option<&UnsubscribeAction> {
        self.actions
            .iter()
            .find(|a| matches!(a, UnsubscribeAction::Web { .. }))
            .or_else(|| {
                self.actions
                    .iter()
                    .find(|a| matches!(a, UnsubscribeAction::Mail { .. }))
            })
            .or_else(|| self.actions.first())
    }
}

/// A message we moved out of the inbox, kept so the move can be undone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub archived_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub id: String,
    pub name: String,
}

/// Raw material for one candidate: the headers and body pulled from a
/// `messages.get` response.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    pub id: String,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub list_unsubscribe: Option<String>,
    pub body_html: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_uri_classifies_schemes() {
        assert!(matches!(
            UnsubscribeAction::from_uri("https://a.example/u"),
            Some(UnsubscribeAction::Web { .. })
        ));
        assert!(matches!(
            UnsubscribeAction::from_uri("mailto:u@example.com"),
            Some(UnsubscribeAction::Mail { .. })
        ));
        assert_eq!(UnsubscribeAction::from_uri("not-a-link"), None);
        assert_eq!(UnsubscribeAction::from_uri("ftp://x.example"), None);
    }

    #[test]
    fn preferred_action_picks_web_over_mail() {
        let c = Candidate {
            id: "m1".into(),
            sender: "news@example.com".into(),
            subject: "hi".into(),
            actions: vec![
                UnsubscribeAction::Mail {
                    url: "mailto:u@example.com".into(),
                },
                UnsubscribeAction::Web {
                    url: "https://a.example/u".into(),
                },
            ],
        };
        assert!(matches!(
            c.preferred_action(),
            Some(UnsubscribeAction::Web { .. })
        ));
    }

    #[test]
    fn preferred_action_falls_back_to_click_only() {
        let c = Candidate {
            id: "m2".into(),
            sender: "s".into(),
            subject: "s".into(),
            actions: vec![UnsubscribeAction::ClickToTrigger],
        };
        assert!(matches!(
            c.preferred_action(),
            Some(UnsubscribeAction::ClickToTrigger)
        ));
    }
}
