//! Device shadow topic builders and parsers for the AWS reserved namespace.
//!
//! Topic structure:
//! ```text
//! $aws/things/{thing}/shadow/get
//! $aws/things/{thing}/shadow/get/accepted
//! $aws/things/{thing}/shadow/get/rejected
//! $aws/things/{thing}/shadow/update
//! $aws/things/{thing}/shadow/update/accepted
//! $aws/things/{thing}/shadow/update/rejected
//! $aws/things/{thing}/shadow/update/delta
//! $aws/things/{thing}/shadow/update/documents
//! $aws/things/{thing}/shadow/delete
//! $aws/things/{thing}/shadow/delete/accepted
//! $aws/things/{thing}/shadow/delete/rejected
//! ```

const PREFIX: &str = "$aws/things";

/// Root shadow topic for a thing: `$aws/things/{thing}/shadow`.
pub fn shadow_root(thing: &str) -> String {
    format!("{PREFIX}/{thing}/shadow")
}

/// Topic set for the classic (unnamed) shadow of one thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowTopics {
    root: String,
}

impl ShadowTopics {
    pub fn new(thing: &str) -> Self {
        Self {
            root: shadow_root(thing),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    // ─── Publish topics ───

    pub fn get(&self) -> String {
        format!("{}/get", self.root)
    }

    pub fn update(&self) -> String {
        format!("{}/update", self.root)
    }

    pub fn delete(&self) -> String {
        format!("{}/delete", self.root)
    }

    // ─── Subscription patterns (with MQTT wildcards) ───

    /// Every response to a get request.
    pub fn get_all(&self) -> String {
        format!("{}/get/#", self.root)
    }

    /// Every notification on the update topic.
    pub fn update_all(&self) -> String {
        format!("{}/update/#", self.root)
    }

    pub fn delete_all(&self) -> String {
        format!("{}/delete/#", self.root)
    }

    // ─── Response topics ───

    pub fn get_accepted(&self) -> String {
        format!("{}/get/accepted", self.root)
    }

    pub fn get_rejected(&self) -> String {
        format!("{}/get/rejected", self.root)
    }

    pub fn update_accepted(&self) -> String {
        format!("{}/update/accepted", self.root)
    }

    pub fn update_rejected(&self) -> String {
        format!("{}/update/rejected", self.root)
    }

    pub fn update_delta(&self) -> String {
        format!("{}/update/delta", self.root)
    }

    pub fn update_documents(&self) -> String {
        format!("{}/update/documents", self.root)
    }

    pub fn delete_accepted(&self) -> String {
        format!("{}/delete/accepted", self.root)
    }

    pub fn delete_rejected(&self) -> String {
        format!("{}/delete/rejected", self.root)
    }
}

// ─── Topic parsing ───

/// Shadow operation a topic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowAction {
    Get,
    Update,
    Delete,
}

/// Broker response kind carried on a shadow response topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowResponseKind {
    Accepted,
    Rejected,
    Delta,
    Documents,
}

/// Parsed shadow topic components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedShadowTopic {
    pub thing: String,
    pub action: ShadowAction,
    /// `None` for request topics (the ones a device publishes to).
    pub response: Option<ShadowResponseKind>,
}

/// Parse a classic shadow topic into its components.
/// Returns `None` if the topic is not in the shadow namespace or is malformed.
pub fn parse_shadow_topic(topic: &str) -> Option<ParsedShadowTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    if parts.len() < 5 || parts[0] != "$aws" || parts[1] != "things" || parts[3] != "shadow" {
        return None;
    }

    let thing = parts[2];
    if thing.is_empty() {
        return None;
    }

    let action = match parts[4] {
        "get" => ShadowAction::Get,
        "update" => ShadowAction::Update,
        "delete" => ShadowAction::Delete,
        _ => return None,
    };

    let response = match (action, parts.get(5).copied()) {
        (_, None) => None,
        (_, Some("accepted")) => Some(ShadowResponseKind::Accepted),
        (_, Some("rejected")) => Some(ShadowResponseKind::Rejected),
        (ShadowAction::Update, Some("delta")) => Some(ShadowResponseKind::Delta),
        (ShadowAction::Update, Some("documents")) => Some(ShadowResponseKind::Documents),
        _ => return None,
    };

    if parts.len() > 6 {
        return None;
    }

    Some(ParsedShadowTopic {
        thing: thing.to_string(),
        action,
        response,
    })
}
