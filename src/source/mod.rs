pub mod datagrepper;
pub mod fixture;
pub mod provider;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventMeta {
    #[serde(default)]
    pub usernames: Vec<String>,
}

/// One upstream message; only the actor metadata is retained.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawEvent {
    #[serde(default)]
    pub meta: EventMeta,
}

#[cfg(test)]
impl RawEvent {
    pub fn by(usernames: &[&str]) -> Self {
        Self {
            meta: EventMeta {
                usernames: usernames.iter().map(|u| u.to_string()).collect(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub pages: u32,
    pub events: Vec<RawEvent>,
}
