/// Organize and undo workflows over a shared, process-wide workflow state
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::environment::{Classifier, CredentialStore, SettingsStore, TabEnvironment, unpinned};
use crate::error::{OrganizeError, UndoError};
use crate::grouping::{self, count_tabs, validate_proposals};
use crate::snapshot::{self, Snapshot};
use crate::tab_data::{TabRecord, Window};

const GENERIC_FAILURE: &str = "Failed to organize tabs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizeResult {
    pub success: bool,
    pub groups_created: usize,
    pub tabs_organized: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrganizeResult {
    pub fn success(groups_created: usize, tabs_organized: usize) -> Self {
        OrganizeResult { success: true, groups_created, tabs_organized, error: None }
    }

    pub fn failure(err: &OrganizeError) -> Self {
        let message = err.to_string();
        OrganizeResult {
            success: false,
            groups_created: 0,
            tabs_organized: 0,
            error: Some(if message.is_empty() { GENERIC_FAILURE.to_string() } else { message }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResult {
    pub success: bool,
    pub tabs_restored: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UndoResult {
    fn success(tabs_restored: usize) -> Self {
        UndoResult { success: true, tabs_restored, error: None }
    }

    fn failure(err: &UndoError) -> Self {
        UndoResult { success: false, tabs_restored: 0, error: Some(err.to_string()) }
    }
}

/// What the popup polls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub is_organizing: bool,
    pub last_result: Option<OrganizeResult>,
    pub can_undo: bool,
}

/// In-flight flag, last outcome and the one retained undo snapshot.
///
/// Shared by `Rc` on a single event loop. `is_organizing` is flipped before the
/// first await of an organize pass, which is what makes the pass single-flight.
#[derive(Debug, Default)]
pub struct WorkflowState {
    organizing: Cell<bool>,
    last_result: RefCell<Option<OrganizeResult>>,
    pending_snapshot: RefCell<Option<Snapshot>>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_organizing(&self) -> bool {
        self.organizing.get()
    }

    pub fn last_result(&self) -> Option<OrganizeResult> {
        self.last_result.borrow().clone()
    }

    pub fn can_undo(&self) -> bool {
        self.pending_snapshot.borrow().as_ref().is_some_and(|s| !s.is_empty())
    }

    pub fn status(&self) -> Status {
        Status {
            is_organizing: self.is_organizing(),
            last_result: self.last_result(),
            can_undo: self.can_undo(),
        }
    }

    /// Claim the organize slot; `false` when a pass is already running
    pub(crate) fn try_begin(&self) -> bool {
        if self.organizing.replace(true) {
            return false;
        }
        self.last_result.replace(None);
        true
    }

    fn finish(&self, result: OrganizeResult) {
        self.organizing.set(false);
        self.last_result.replace(Some(result));
    }

    fn store_snapshot(&self, snapshot: Snapshot) {
        self.pending_snapshot.replace(Some(snapshot));
    }

    fn discard_snapshot(&self) {
        self.pending_snapshot.replace(None);
    }

    fn take_snapshot(&self) -> Option<Snapshot> {
        self.pending_snapshot.take()
    }

    fn clear_last_result(&self) {
        self.last_result.replace(None);
    }
}

/// Runs organize and undo passes against the browser
pub struct Organizer<E, C, S> {
    env: E,
    classifier: C,
    store: S,
    state: Rc<WorkflowState>,
}

impl<E, C, S> Organizer<E, C, S>
where
    E: TabEnvironment,
    C: Classifier,
    S: CredentialStore + SettingsStore,
{
    pub fn new(env: E, classifier: C, store: S, state: Rc<WorkflowState>) -> Self {
        Organizer { env, classifier, store, state }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn status(&self) -> Status {
        self.state.status()
    }

    /// Group the current window's tabs by topic.
    ///
    /// A call made while another pass is running is rejected without touching any state.
    pub async fn organize(&self) -> OrganizeResult {
        if !self.state.try_begin() {
            warn!("Organize rejected: a pass is already running");
            return OrganizeResult::failure(&OrganizeError::Busy);
        }

        info!("Organizing tabs");
        let result = match self.run_organize().await {
            Ok((groups_created, tabs_organized)) => {
                info!("Organized {} tabs into {} groups", tabs_organized, groups_created);
                OrganizeResult::success(groups_created, tabs_organized)
            }
            Err(err) => {
                self.state.discard_snapshot();
                error!("Organize failed: {}", err);
                OrganizeResult::failure(&err)
            }
        };

        self.state.finish(result.clone());
        result
    }

    async fn run_organize(&self) -> Result<(usize, usize), OrganizeError> {
        let api_key = self
            .store
            .get_key()
            .await?
            .filter(|k| !k.is_empty())
            .ok_or(OrganizeError::MissingKey)?;

        let tabs = unpinned(self.env.list_tabs(Window::Current).await?);
        match tabs.len() {
            0 => return Err(OrganizeError::NothingToOrganize),
            1 => return Err(OrganizeError::NeedTwoTabs),
            _ => {}
        }

        let groups = self.env.list_groups(Window::Current).await?;
        let records: Vec<TabRecord> = tabs.iter().map(|t| TabRecord::from_browser_tab(t, &groups)).collect();

        // Undo point; must be taken before anything is mutated
        let snapshot = snapshot::capture(&self.env).await?;
        self.state.store_snapshot(snapshot);

        let model = self.store.selected_model().await?;
        let proposals = self.classifier.classify(&api_key, &records, &model).await?;
        let proposals = validate_proposals(proposals, &records);
        if proposals.is_empty() {
            return Err(OrganizeError::NoGroups);
        }

        let groups_created = grouping::apply(&self.env, &proposals).await?;
        Ok((groups_created, count_tabs(&proposals)))
    }

    /// Restore the arrangement recorded before the last organize pass.
    ///
    /// Single-use: the snapshot is gone afterwards even if restoring failed.
    pub async fn undo(&self) -> UndoResult {
        let snapshot = match self.state.take_snapshot() {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => return UndoResult::failure(&UndoError::NothingToRestore),
        };

        info!("Undoing last organize ({} tabs)", snapshot.len());
        let outcome = snapshot::restore(&self.env, &snapshot).await;
        self.state.discard_snapshot();
        self.state.clear_last_result();

        match outcome {
            Ok(restored) => UndoResult::success(restored),
            Err(err) => {
                error!("Undo failed: {}", err);
                UndoResult::failure(&UndoError::from(err))
            }
        }
    }
}
