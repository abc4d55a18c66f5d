//! Local view of the user's remote item collection.
//!
//! The server owns every item. The directory keeps a possibly stale copy
//! that is replaced wholesale after each fetch, plus the edit draft bound to
//! the item form. Every successful mutation is followed by exactly one full
//! re-fetch; nothing is patched locally.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{Item, ItemPayload};

const FETCH_FAILED: &str = "Failed to fetch items";

/// A request against the item collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOp {
    List,
    Create(ItemPayload),
    Update(i64, ItemPayload),
    Delete(i64),
}

impl ItemOp {
    /// Generic message shown when the server gave no `detail`
    pub fn failure_message(&self) -> &'static str {
        match self {
            ItemOp::List => FETCH_FAILED,
            ItemOp::Create(_) => "Failed to create item",
            ItemOp::Update(..) => "Failed to update item",
            ItemOp::Delete(_) => "Failed to delete item",
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, ItemOp::List)
    }
}

/// What happened to an `ItemOp` on the wire.
#[derive(Debug)]
pub enum OpOutcome {
    /// The op (and its re-fetch, for mutations) succeeded
    Settled(Vec<Item>),
    /// The mutation succeeded but the follow-up fetch did not
    RefreshFailed(ApiError),
    /// The op itself failed; nothing changed on the server
    Failed(ApiError),
}

/// Perform `op` and, for mutations, the single list re-fetch that follows.
pub async fn run(api: &ApiClient, op: &ItemOp) -> OpOutcome {
    let mutation = match op {
        ItemOp::List => Ok(()),
        ItemOp::Create(payload) => api.create_item(payload).await,
        ItemOp::Update(id, payload) => api.update_item(*id, payload).await,
        ItemOp::Delete(id) => api.delete_item(*id).await,
    };

    if let Err(e) = mutation {
        return OpOutcome::Failed(e);
    }

    match api.list_items().await {
        Ok(items) => OpOutcome::Settled(items),
        Err(e) if op.is_mutation() => OpOutcome::RefreshFailed(e),
        Err(e) => OpOutcome::Failed(e),
    }
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Title is required")]
    TitleRequired,

    #[error("No item is being edited")]
    NotEditing,

    #[error("Another change is still in progress")]
    Busy,

    #[error("{message}")]
    Request {
        message: String,
        #[source]
        source: ApiError,
    },
}

impl DirectoryError {
    fn request(source: ApiError, fallback: &str) -> Self {
        DirectoryError::Request {
            message: source.user_message(fallback),
            source,
        }
    }
}

/// Contents of the item form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    editing_id: Option<i64>,
}

impl Draft {
    pub fn editing_id(&self) -> Option<i64> {
        self.editing_id
    }

    pub fn is_editing(&self) -> bool {
        self.editing_id.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn payload(&self) -> Result<ItemPayload, DirectoryError> {
        if self.title.trim().is_empty() {
            return Err(DirectoryError::TitleRequired);
        }
        Ok(ItemPayload::new(self.title.clone(), self.description.clone()))
    }
}

#[derive(Debug, Default)]
pub struct ItemDirectory {
    items: Vec<Item>,
    pub draft: Draft,
    in_flight: bool,
    synced_at: Option<DateTime<Utc>>,
}

impl ItemDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Time of the last successful fetch
    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    pub fn start_edit(&mut self, item: &Item) {
        self.draft = Draft {
            title: item.title.clone(),
            description: item.description.clone().unwrap_or_default(),
            editing_id: Some(item.id),
        };
    }

    pub fn cancel_edit(&mut self) {
        self.draft.clear();
    }

    /// Op that creates an item from the draft
    pub fn create_op(&self) -> Result<ItemOp, DirectoryError> {
        Ok(ItemOp::Create(self.draft.payload()?))
    }

    /// Op that saves the draft over the item being edited
    pub fn save_edit_op(&self) -> Result<ItemOp, DirectoryError> {
        let id = self.draft.editing_id.ok_or(DirectoryError::NotEditing)?;
        Ok(ItemOp::Update(id, self.draft.payload()?))
    }

    /// Claim the single in-flight slot. Must be paired with `apply`.
    pub fn begin(&mut self) -> Result<(), DirectoryError> {
        if self.in_flight {
            return Err(DirectoryError::Busy);
        }
        self.in_flight = true;
        Ok(())
    }

    /// Fold an outcome into local state and release the in-flight slot.
    ///
    /// Failures leave items and draft untouched, except that a mutation
    /// which succeeded before its re-fetch failed still applies its draft
    /// effects.
    pub fn apply(&mut self, op: &ItemOp, outcome: OpOutcome) -> Result<(), DirectoryError> {
        self.in_flight = false;
        match outcome {
            OpOutcome::Settled(items) => {
                self.after_mutation(op);
                debug!(count = items.len(), "Item list replaced");
                self.items = items;
                self.synced_at = Some(Utc::now());
                Ok(())
            }
            OpOutcome::RefreshFailed(e) => {
                self.after_mutation(op);
                warn!(error = %e, "Item re-fetch failed after a successful change");
                Err(DirectoryError::request(e, FETCH_FAILED))
            }
            OpOutcome::Failed(e) => {
                warn!(error = %e, ?op, "Item operation failed");
                Err(DirectoryError::request(e, op.failure_message()))
            }
        }
    }

    fn after_mutation(&mut self, op: &ItemOp) {
        match op {
            ItemOp::List => {}
            ItemOp::Create(_) | ItemOp::Update(..) => self.draft.clear(),
            ItemOp::Delete(id) => {
                if self.draft.editing_id == Some(*id) {
                    self.draft.clear();
                }
            }
        }
    }

    /// Run `op` to completion against `api` and apply the result.
    pub async fn execute(&mut self, api: &ApiClient, op: ItemOp) -> Result<(), DirectoryError> {
        self.begin()?;
        let outcome = run(api, &op).await;
        self.apply(&op, outcome)
    }

    pub async fn refresh(&mut self, api: &ApiClient) -> Result<(), DirectoryError> {
        self.execute(api, ItemOp::List).await
    }

    pub async fn create(&mut self, api: &ApiClient) -> Result<(), DirectoryError> {
        let op = self.create_op()?;
        self.execute(api, op).await
    }

    pub async fn save_edit(&mut self, api: &ApiClient) -> Result<(), DirectoryError> {
        let op = self.save_edit_op()?;
        self.execute(api, op).await
    }

    pub async fn delete(&mut self, api: &ApiClient, id: i64) -> Result<(), DirectoryError> {
        self.execute(api, ItemOp::Delete(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn item(id: i64, title: &str) -> Item {
        Item {
            id,
            title: title.to_string(),
            description: None,
            owner_id: Some(1),
        }
    }

    fn rejected(detail: Option<&str>) -> ApiError {
        ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            detail: detail.map(str::to_string),
        }
    }

    #[test]
    fn test_start_edit_copies_item() {
        let mut dir = ItemDirectory::new();
        let mut milk = item(3, "Milk");
        milk.description = Some("2L".to_string());
        dir.start_edit(&milk);
        assert_eq!(dir.draft.title, "Milk");
        assert_eq!(dir.draft.description, "2L");
        assert_eq!(dir.draft.editing_id(), Some(3));

        dir.start_edit(&item(4, "Eggs"));
        assert_eq!(dir.draft.description, "");

        dir.cancel_edit();
        assert_eq!(dir.draft, Draft::default());
    }

    #[test]
    fn test_title_required() {
        let mut dir = ItemDirectory::new();
        dir.draft.title = "   ".to_string();
        assert!(matches!(dir.create_op(), Err(DirectoryError::TitleRequired)));

        dir.draft.title = "Milk".to_string();
        assert_eq!(dir.create_op().unwrap(), ItemOp::Create(ItemPayload::new("Milk", "")));
    }

    #[test]
    fn test_save_edit_requires_editing() {
        let mut dir = ItemDirectory::new();
        dir.draft.title = "Milk".to_string();
        assert!(matches!(dir.save_edit_op(), Err(DirectoryError::NotEditing)));

        dir.start_edit(&item(9, "Milk"));
        dir.draft.title = "Oat milk".to_string();
        assert_eq!(
            dir.save_edit_op().unwrap(),
            ItemOp::Update(9, ItemPayload::new("Oat milk", ""))
        );
    }

    #[test]
    fn test_single_in_flight() {
        let mut dir = ItemDirectory::new();
        dir.begin().unwrap();
        assert!(dir.is_busy());
        assert!(matches!(dir.begin(), Err(DirectoryError::Busy)));

        dir.apply(&ItemOp::List, OpOutcome::Settled(vec![])).unwrap();
        assert!(!dir.is_busy());
        dir.begin().unwrap();
    }

    #[test]
    fn test_list_replaces_wholesale() {
        let mut dir = ItemDirectory::new();
        dir.begin().unwrap();
        dir.apply(&ItemOp::List, OpOutcome::Settled(vec![item(1, "a"), item(2, "b")]))
            .unwrap();
        assert_eq!(dir.items().len(), 2);
        assert!(dir.synced_at().is_some());

        dir.begin().unwrap();
        dir.apply(&ItemOp::List, OpOutcome::Settled(vec![item(5, "c")])).unwrap();
        assert_eq!(dir.items(), &[item(5, "c")]);
    }

    #[test]
    fn test_create_clears_draft() {
        let mut dir = ItemDirectory::new();
        dir.draft.title = "Milk".to_string();
        let op = dir.create_op().unwrap();
        dir.begin().unwrap();
        dir.apply(&op, OpOutcome::Settled(vec![item(1, "Milk")])).unwrap();
        assert_eq!(dir.draft, Draft::default());
        assert_eq!(dir.items().len(), 1);
    }

    #[test]
    fn test_delete_of_edited_item_clears_draft() {
        let mut dir = ItemDirectory::new();
        dir.start_edit(&item(3, "Milk"));
        dir.begin().unwrap();
        dir.apply(&ItemOp::Delete(3), OpOutcome::Settled(vec![])).unwrap();
        assert_eq!(dir.draft, Draft::default());
    }

    #[test]
    fn test_delete_of_other_item_keeps_draft() {
        let mut dir = ItemDirectory::new();
        dir.start_edit(&item(3, "Milk"));
        dir.draft.title = "Milk (edited)".to_string();
        let before = dir.draft.clone();

        dir.begin().unwrap();
        dir.apply(&ItemOp::Delete(4), OpOutcome::Settled(vec![item(3, "Milk")]))
            .unwrap();
        assert_eq!(dir.draft, before);
    }

    #[test]
    fn test_failure_leaves_state_unchanged() {
        let mut dir = ItemDirectory::new();
        dir.begin().unwrap();
        dir.apply(&ItemOp::List, OpOutcome::Settled(vec![item(1, "Milk")])).unwrap();
        dir.start_edit(&item(1, "Milk"));
        dir.draft.title = "Oat milk".to_string();
        let draft = dir.draft.clone();

        let op = dir.save_edit_op().unwrap();
        dir.begin().unwrap();
        let err = dir.apply(&op, OpOutcome::Failed(rejected(None))).unwrap_err();
        assert_eq!(err.to_string(), "Failed to update item");
        assert_eq!(dir.draft, draft);
        assert_eq!(dir.items(), &[item(1, "Milk")]);
        assert!(!dir.is_busy());
    }

    #[test]
    fn test_failure_prefers_server_detail() {
        let mut dir = ItemDirectory::new();
        dir.begin().unwrap();
        let err = dir
            .apply(&ItemOp::Delete(8), OpOutcome::Failed(rejected(Some("Item not found"))))
            .unwrap_err();
        assert_eq!(err.to_string(), "Item not found");
    }

    #[test]
    fn test_refresh_failure_after_mutation() {
        let mut dir = ItemDirectory::new();
        dir.begin().unwrap();
        dir.apply(&ItemOp::List, OpOutcome::Settled(vec![item(1, "Milk")])).unwrap();
        dir.draft.title = "Eggs".to_string();

        let op = dir.create_op().unwrap();
        dir.begin().unwrap();
        let err = dir.apply(&op, OpOutcome::RefreshFailed(rejected(None))).unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch items");
        assert_eq!(dir.draft, Draft::default());
        assert_eq!(dir.items(), &[item(1, "Milk")]);
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(ItemOp::List.failure_message(), "Failed to fetch items");
        assert_eq!(ItemOp::Delete(1).failure_message(), "Failed to delete item");
        assert!(!ItemOp::List.is_mutation());
        assert!(ItemOp::Delete(1).is_mutation());
    }
}
