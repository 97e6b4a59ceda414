//! Confirmation gate for destructive and state-changing row actions.
//!
//! Nothing is mutated when an action is requested; it is parked behind a
//! prompt and handed out exactly once on confirm.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RowAction {
    Delete {
        id: String,
    },
    BulkDelete {
        ids: Vec<String>,
    },
    SetVisibility {
        id: String,
        visible: bool,
    },
    SetStatus {
        id: String,
        status: String,
        #[serde(default)]
        notes: Option<String>,
    },
    /// Drops one image (by position) from a multi-file record.
    RemoveAttachment {
        id: String,
        index: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmVariant {
    Danger,
    Success,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConfirmPrompt {
    pub title: String,
    pub description: String,
    pub confirm_label: String,
    pub variant: ConfirmVariant,
}

impl RowAction {
    /// Ids of the rows the action touches.
    pub fn target_ids(&self) -> Vec<&str> {
        match self {
            RowAction::Delete { id }
            | RowAction::SetVisibility { id, .. }
            | RowAction::SetStatus { id, .. }
            | RowAction::RemoveAttachment { id, .. } => vec![id.as_str()],
            RowAction::BulkDelete { ids } => ids.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            RowAction::Delete { .. } | RowAction::BulkDelete { .. } | RowAction::RemoveAttachment { .. }
        )
    }

    /// Prompt text for a record type labelled `label` ("Job", "Update").
    pub fn prompt(&self, label: &str) -> ConfirmPrompt {
        let lower = label.to_lowercase();
        let (title, description, confirm_label, variant) = match self {
            RowAction::Delete { .. } => (
                format!("Delete {}?", lower),
                format!(
                    "This will permanently delete the {} and its attached files. This action cannot be undone.",
                    lower
                ),
                "Delete".to_string(),
                ConfirmVariant::Danger,
            ),
            RowAction::BulkDelete { ids } => (
                format!("Delete {} selected records?", ids.len()),
                "The selected records and their attached files will be permanently deleted.".to_string(),
                "Delete selected".to_string(),
                ConfirmVariant::Danger,
            ),
            RowAction::SetVisibility { visible: true, .. } => (
                format!("Make {} visible?", lower),
                "It will be shown on the public website.".to_string(),
                "Make visible".to_string(),
                ConfirmVariant::Success,
            ),
            RowAction::SetVisibility { visible: false, .. } => (
                format!("Hide {}?", lower),
                "It will no longer be shown on the public website.".to_string(),
                "Hide".to_string(),
                ConfirmVariant::Neutral,
            ),
            RowAction::SetStatus { status, .. } => (
                format!("Mark {} as {}?", lower, status),
                format!("The status of this {} will be set to {}.", lower, status),
                "Update status".to_string(),
                ConfirmVariant::Success,
            ),
            RowAction::RemoveAttachment { .. } => (
                "Delete this image?".to_string(),
                "The image will be removed from the record and from storage.".to_string(),
                "Delete".to_string(),
                ConfirmVariant::Danger,
            ),
        };
        ConfirmPrompt {
            title,
            description,
            confirm_label,
            variant,
        }
    }
}

/// Single-slot gate. Opening replaces whatever was pending; `confirm` and
/// `dismiss` both leave it closed.
#[derive(Debug, Default)]
pub struct ConfirmationGate {
    pending: Option<(RowAction, ConfirmPrompt)>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, action: RowAction, prompt: ConfirmPrompt) -> &ConfirmPrompt {
        &self.pending.insert((action, prompt)).1
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    pub fn prompt(&self) -> Option<&ConfirmPrompt> {
        self.pending.as_ref().map(|(_, p)| p)
    }

    pub fn pending(&self) -> Option<&RowAction> {
        self.pending.as_ref().map(|(a, _)| a)
    }

    pub fn confirm(&mut self) -> Option<RowAction> {
        self.pending.take().map(|(a, _)| a)
    }

    pub fn dismiss(&mut self) {
        self.pending = None;
    }
}

pub const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct PendingAction {
    pub resource: String,
    pub action: RowAction,
    pub prompt: ConfirmPrompt,
    /// User that opened the prompt; only they may confirm or cancel it.
    pub owner: String,
    opened_at: Instant,
}

/// Token-keyed confirmation gates for the HTTP surface.
pub struct PendingActions {
    ttl: Duration,
    entries: Mutex<HashMap<String, PendingAction>>,
}

impl Default for PendingActions {
    fn default() -> Self {
        Self::new(PENDING_TTL)
    }
}

fn new_token() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

impl PendingActions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Parks `action` and returns its token.
    pub async fn open(
        &self,
        resource: &str,
        owner: &str,
        action: RowAction,
        prompt: ConfirmPrompt,
    ) -> String {
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, p| p.opened_at.elapsed() < ttl);

        let token = new_token();
        entries.insert(
            token.clone(),
            PendingAction {
                resource: resource.to_string(),
                action,
                prompt,
                owner: owner.to_string(),
                opened_at: Instant::now(),
            },
        );
        token
    }

    /// Removes and returns the entry if it exists, is fresh and belongs to
    /// `owner`. A taken token can never be taken again.
    pub async fn take(&self, token: &str, owner: &str) -> Option<PendingAction> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get(token)?;
        if entry.opened_at.elapsed() >= self.ttl {
            entries.remove(token);
            return None;
        }
        if entry.owner != owner {
            return None;
        }
        entries.remove(token)
    }

    /// Discards the entry; returns whether there was one to discard.
    pub async fn cancel(&self, token: &str, owner: &str) -> bool {
        self.take(token, owner).await.is_some()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete(id: &str) -> RowAction {
        RowAction::Delete { id: id.to_string() }
    }

    #[test]
    fn variants_follow_severity() {
        assert_eq!(delete("1").prompt("Job").variant, ConfirmVariant::Danger);
        let show = RowAction::SetVisibility {
            id: "1".into(),
            visible: true,
        };
        assert_eq!(show.prompt("Job").variant, ConfirmVariant::Success);
        let hide = RowAction::SetVisibility {
            id: "1".into(),
            visible: false,
        };
        assert_eq!(hide.prompt("Job").variant, ConfirmVariant::Neutral);
        assert_eq!(hide.prompt("Job").title, "Hide job?");
    }

    #[test]
    fn gate_hands_out_once() {
        let mut gate = ConfirmationGate::new();
        assert!(gate.confirm().is_none());

        let action = delete("7");
        let prompt = action.prompt("Update");
        gate.open(action.clone(), prompt);
        assert!(gate.is_open());
        assert_eq!(gate.confirm(), Some(action));
        assert!(!gate.is_open());
        assert!(gate.confirm().is_none());
    }

    #[test]
    fn dismiss_discards_and_reopen_is_fresh() {
        let mut gate = ConfirmationGate::new();
        gate.open(delete("1"), delete("1").prompt("Job"));
        gate.dismiss();
        assert!(gate.prompt().is_none());

        gate.open(delete("2"), delete("2").prompt("Job"));
        gate.open(delete("3"), delete("3").prompt("Job"));
        assert_eq!(gate.confirm(), Some(delete("3")));
    }

    #[test]
    fn action_wire_format() {
        let a: RowAction =
            serde_json::from_str(r#"{"type":"set_visibility","id":"4","visible":false}"#).unwrap();
        assert_eq!(
            a,
            RowAction::SetVisibility {
                id: "4".into(),
                visible: false
            }
        );
    }

    #[tokio::test]
    async fn tokens_are_single_use_and_owned() {
        let pending = PendingActions::default();
        let token = pending
            .open("jobs", "user-1", delete("1"), delete("1").prompt("Job"))
            .await;

        assert!(pending.take(&token, "user-2").await.is_none());
        let got = pending.take(&token, "user-1").await.unwrap();
        assert_eq!(got.action, delete("1"));
        assert!(pending.take(&token, "user-1").await.is_none());
    }

    #[tokio::test]
    async fn expired_tokens_are_refused() {
        let pending = PendingActions::new(Duration::from_millis(0));
        let token = pending
            .open("jobs", "u", delete("1"), delete("1").prompt("Job"))
            .await;
        assert!(pending.take(&token, "u").await.is_none());
        assert_eq!(pending.len().await, 0);
    }
}
