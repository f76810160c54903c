use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(rename = "dateEnvoi", default)]
    pub sent_at: Option<String>,
    #[serde(rename = "lue", default)]
    pub read: bool,
}

impl Notification {
    pub fn is_alert(&self) -> bool {
        self.kind.as_deref() == Some("ALERTE")
    }
}

/// The unread endpoint replies with either the unread list or a bare count.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UnreadReply {
    Count(u64),
    List(Vec<serde_json::Value>),
}

impl UnreadReply {
    pub fn count(&self) -> u64 {
        match self {
            UnreadReply::Count(n) => *n,
            UnreadReply::List(items) => items.len() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread: u64,
}
