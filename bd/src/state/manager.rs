//! StateManager - actor that owns the RowStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;
use std::sync::Arc;

use rowstore::Document;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::{Filter, Goal, Prospect, ProspectInteraction, Record, Stage, Store};

use super::messages::{StateCommand, StateError, StateResponse};

/// Event broadcast after a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    Created { collection: String, id: String },
    Updated { collection: String, id: String },
    Deleted { collection: String, id: String },
}

/// Handle to send commands to the StateManager
///
/// Every handle is scoped to one owner; typed list helpers filter by it.
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    /// Broadcast sender for state change notifications
    event_tx: broadcast::Sender<StateEvent>,
    owner_id: Arc<str>,
}

impl StateManager {
    /// Spawn a new StateManager actor over a store directory
    pub fn spawn(store_path: impl AsRef<Path>, owner_id: &str) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), %owner_id, "spawn: called");
        let mut store = Store::open(store_path.as_ref())?;

        // Index layout may have changed between versions
        let stage_count = store.rebuild_indexes::<Stage>()?;
        let prospect_count = store.rebuild_indexes::<Prospect>()?;
        let interaction_count = store.rebuild_indexes::<ProspectInteraction>()?;
        let goal_count = store.rebuild_indexes::<Goal>()?;
        info!(
            stage_count,
            prospect_count, interaction_count, goal_count, "Rebuilt indexes for pipeline and goal records"
        );

        Ok(Self::start(store, owner_id))
    }

    /// Spawn an actor over a throwaway in-memory store
    pub fn spawn_in_memory(owner_id: &str) -> eyre::Result<Self> {
        debug!(%owner_id, "spawn_in_memory: called");
        Ok(Self::start(Store::open_in_memory()?, owner_id))
    }

    fn start(store: Store, owner_id: &str) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);

        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");

        Self {
            tx,
            event_tx,
            owner_id: Arc::from(owner_id),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Subscribe to state change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(make(reply_tx)).await.map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    // === Typed record operations ===

    /// Insert a new record, failing if its id is taken
    pub async fn create<T: Record>(&self, record: &T) -> StateResponse<String> {
        debug!(collection = T::collection_name(), id = %record.id(), "create: called");
        let doc = Document::from_record(record).map_err(StateError::store)?;
        let id = self.request(|reply| StateCommand::Insert { doc, reply }).await?;
        self.emit(StateEvent::Created {
            collection: T::collection_name().to_string(),
            id: id.clone(),
        });
        Ok(id)
    }

    /// Get a record by ID
    pub async fn get<T: Record>(&self, id: &str) -> StateResponse<Option<T>> {
        debug!(collection = T::collection_name(), %id, "get: called");
        let value = self
            .request(|reply| StateCommand::Get {
                collection: T::collection_name().to_string(),
                id: id.to_string(),
                reply,
            })
            .await?;
        value.map(decode::<T>).transpose()
    }

    /// Get a record by ID, returning error if not found
    pub async fn get_required<T: Record>(&self, id: &str) -> StateResponse<T> {
        self.get(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("{} {}", T::collection_name(), id)))
    }

    /// Replace an existing record
    pub async fn update<T: Record>(&self, record: &T) -> StateResponse<()> {
        self.update_all(std::slice::from_ref(record)).await
    }

    /// Replace several records atomically
    pub async fn update_all<T: Record>(&self, records: &[T]) -> StateResponse<()> {
        debug!(collection = T::collection_name(), count = records.len(), "update_all: called");
        if records.is_empty() {
            return Ok(());
        }
        let docs = records
            .iter()
            .map(Document::from_record)
            .collect::<eyre::Result<Vec<_>>>()
            .map_err(StateError::store)?;
        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();

        self.request(|reply| StateCommand::Update { docs, reply }).await?;
        for id in ids {
            self.emit(StateEvent::Updated {
                collection: T::collection_name().to_string(),
                id,
            });
        }
        Ok(())
    }

    /// Delete a record, returning whether it existed
    pub async fn delete<T: Record>(&self, id: &str) -> StateResponse<bool> {
        debug!(collection = T::collection_name(), %id, "delete: called");
        let removed = self
            .request(|reply| StateCommand::Delete {
                collection: T::collection_name().to_string(),
                id: id.to_string(),
                reply,
            })
            .await?;
        if removed {
            self.emit(StateEvent::Deleted {
                collection: T::collection_name().to_string(),
                id: id.to_string(),
            });
        }
        Ok(removed)
    }

    /// List records matching every filter, in insertion order
    pub async fn list<T: Record>(&self, filters: Vec<Filter>) -> StateResponse<Vec<T>> {
        debug!(collection = T::collection_name(), filter_count = filters.len(), "list: called");
        let values = self
            .request(|reply| StateCommand::List {
                collection: T::collection_name().to_string(),
                filters,
                reply,
            })
            .await?;
        values.into_iter().map(decode::<T>).collect()
    }

    /// List records belonging to this handle's owner
    pub async fn list_owned<T: Record>(&self, mut filters: Vec<Filter>) -> StateResponse<Vec<T>> {
        filters.insert(0, Filter::eq("owner_id", self.owner_id()));
        self.list(filters).await
    }

    /// Stop the actor; pending commands already queued are still served
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        let _ = self.tx.send(StateCommand::Shutdown).await;
    }
}

fn decode<T: Record>(value: Value) -> StateResponse<T> {
    serde_json::from_value(value)
        .map_err(|e| StateError::DeserializationError(format!("{}: {}", T::collection_name(), e)))
}

/// The actor loop that owns the Store and processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::Insert { doc, reply } => {
                debug!(collection = %doc.collection, id = %doc.id, "actor_loop: Insert command");
                let result = store
                    .insert_document(&doc)
                    .map(|_| doc.id.clone())
                    .map_err(StateError::store);
                let _ = reply.send(result);
            }

            StateCommand::Get { collection, id, reply } => {
                debug!(%collection, %id, "actor_loop: Get command");
                let result = store.get_document(&collection, &id).map_err(StateError::store);
                let _ = reply.send(result);
            }

            StateCommand::Update { docs, reply } => {
                debug!(count = docs.len(), "actor_loop: Update command");
                let result = store.update_documents(&docs).map_err(|e| {
                    let msg = e.to_string();
                    if msg.starts_with("Record not found") {
                        StateError::NotFound(msg)
                    } else {
                        StateError::StoreError(msg)
                    }
                });
                let _ = reply.send(result);
            }

            StateCommand::Delete { collection, id, reply } => {
                debug!(%collection, %id, "actor_loop: Delete command");
                let result = store.delete_document(&collection, &id).map_err(StateError::store);
                let _ = reply.send(result);
            }

            StateCommand::List {
                collection,
                filters,
                reply,
            } => {
                debug!(%collection, filter_count = filters.len(), "actor_loop: List command");
                let result = store.list_documents(&collection, &filters).map_err(StateError::store);
                let _ = reply.send(result);
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}
