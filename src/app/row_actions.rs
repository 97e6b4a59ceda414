//! Confirm-then-mutate row actions and multi-row selection.

use crate::app::list_controller::ListController;
use crate::app::resource_service::ResourceService;
use crate::domain::confirm::{ConfirmPrompt, ConfirmationGate, RowAction};
use crate::domain::notice::Notice;
use crate::domain::resource::ResourceSpec;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

pub struct RowActionHandler {
    service: ResourceService,
    spec: Arc<ResourceSpec>,
    gate: ConfirmationGate,
    selection: BTreeSet<String>,
}

impl RowActionHandler {
    pub fn new(service: ResourceService, spec: Arc<ResourceSpec>) -> Self {
        Self {
            service,
            spec,
            gate: ConfirmationGate::new(),
            selection: BTreeSet::new(),
        }
    }

    /// Parks `action` behind a prompt. Nothing is mutated yet.
    pub fn request(&mut self, action: RowAction) -> ConfirmPrompt {
        let prompt = action.prompt(self.spec.label);
        self.gate.open(action, prompt).clone()
    }

    pub fn is_open(&self) -> bool {
        self.gate.is_open()
    }

    pub fn pending(&self) -> Option<&RowAction> {
        self.gate.pending()
    }

    /// Runs the pending action, closes the gate and, on success, refreshes
    /// `list`. `None` when nothing was pending.
    pub async fn confirm(&mut self, list: &mut ListController) -> Option<Notice> {
        let action = self.gate.confirm()?;
        let bulk = matches!(action, RowAction::BulkDelete { .. });

        let result = self.service.perform(&self.spec, action).await;
        if bulk {
            self.selection.clear();
        }
        match result {
            Ok(outcome) => {
                list.refresh().await;
                Some(outcome.notice(self.spec.label))
            }
            Err(e) => {
                warn!(resource = self.spec.key, error = %e, "row action failed");
                Some(e.notice())
            }
        }
    }

    pub fn cancel(&mut self) {
        self.gate.dismiss();
    }

    pub fn select(&mut self, id: &str, selected: bool) {
        if selected {
            self.selection.insert(id.to_string());
        } else {
            self.selection.remove(id);
        }
    }

    /// Replaces the selection with `ids`.
    pub fn select_all<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = ids.into_iter().map(Into::into).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selected(&self) -> Vec<String> {
        self.selection.iter().cloned().collect()
    }

    pub fn request_bulk_delete(&mut self) -> Result<ConfirmPrompt, Notice> {
        if self.selection.is_empty() {
            return Err(Notice::error("No rows selected"));
        }
        Ok(self.request(RowAction::BulkDelete {
            ids: self.selected(),
        }))
    }
}
