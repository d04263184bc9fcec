use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use super::{Change, ChangeOp, RowPage, Store, StoreSession};
use crate::{PagingModel, SortDirection, StoreError, StoreResult};

type Tables = HashMap<&'static str, BTreeMap<Uuid, Value>>;

#[derive(Default)]
struct MemoryState {
    tables: Tables,
    writes: u64,
    opened: u64,
    closed: u64,
}

/// In-process store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of change-sets successfully written.
    pub fn writes(&self) -> u64 {
        self.state.lock().writes
    }

    pub fn opened_sessions(&self) -> u64 {
        self.state.lock().opened
    }

    pub fn closed_sessions(&self) -> u64 {
        self.state.lock().closed
    }

    pub fn row_count(&self, kind: &str) -> usize {
        self.state.lock().tables.get(kind).map_or(0, BTreeMap::len)
    }

    /// Writes rows directly, bypassing change tracking.
    pub fn seed(&self, kind: &'static str, rows: impl IntoIterator<Item = (Uuid, Value)>) {
        self.state.lock().tables.entry(kind).or_default().extend(rows);
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn open_session(&self) -> MemorySession {
        self.state.lock().opened += 1;
        MemorySession {
            state: Arc::clone(&self.state),
            closed: false,
        }
    }
}

pub struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

fn apply_to(tables: &mut Tables, change: &Change) -> StoreResult<()> {
    let table = tables.entry(change.kind).or_default();
    match &change.op {
        ChangeOp::Insert(body) => {
            if table.contains_key(&change.id) {
                return Err(StoreError::Conflict {
                    kind: change.kind,
                    id: change.id,
                });
            }
            table.insert(change.id, body.clone());
        }
        ChangeOp::Update(body) => match table.get_mut(&change.id) {
            Some(row) => *row = body.clone(),
            None => {
                return Err(StoreError::NotFound {
                    kind: change.kind,
                    id: change.id,
                })
            }
        },
        ChangeOp::Delete => {
            if table.remove(&change.id).is_none() {
                return Err(StoreError::NotFound {
                    kind: change.kind,
                    id: change.id,
                });
            }
        }
    }
    Ok(())
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    fn apply(&mut self, changes: &[Change]) -> StoreResult<u64> {
        self.ensure_open()?;
        let mut state = self.state.lock();

        let mut staged = state.tables.clone();
        for change in changes {
            apply_to(&mut staged, change)?;
        }
        state.tables = staged;
        state.writes += 1;
        Ok(changes.len() as u64)
    }

    async fn apply_async(&mut self, changes: &[Change]) -> StoreResult<u64> {
        tokio::task::yield_now().await;
        self.apply(changes)
    }

    async fn fetch(&mut self, kind: &'static str, id: Uuid) -> StoreResult<Option<Value>> {
        self.ensure_open()?;
        let state = self.state.lock();
        Ok(state.tables.get(kind).and_then(|t| t.get(&id)).cloned())
    }

    async fn page(&mut self, kind: &'static str, paging: &PagingModel) -> StoreResult<RowPage> {
        self.ensure_open()?;
        let paging = paging.normalized();
        let mut rows: Vec<Value> = {
            let state = self.state.lock();
            state
                .tables
                .get(kind)
                .map(|t| t.values().cloned().collect())
                .unwrap_or_default()
        };
        let total = rows.len() as u64;

        if let Some(field) = paging.sort.as_deref() {
            let descending = paging.order == Some(SortDirection::Descending);
            // stable sort keeps ties in id order for both directions
            rows.sort_by(|a, b| {
                let ordering = compare_field(a.get(field), b.get(field));
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let rows = rows
            .into_iter()
            .skip(paging.offset() as usize)
            .take(paging.size as usize)
            .collect();
        Ok(RowPage { rows, total })
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().closed += 1;
        }
    }
}
