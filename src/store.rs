use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    /// Base64-encoded image returned by the generator.
    Succeeded(String),
    /// User-facing message; the underlying cause is only logged.
    Failed(String),
}

impl TaskState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub id: Uuid,
    pub style_id: String,
    pub state: TaskState,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Dispatching,
    Settled,
}

/// Issued for every dispatched generation call. A result may only be written
/// back with the ticket of the most recent dispatch of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTicket {
    pub session: u64,
    pub style_id: String,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The store was reset for a newer source image after dispatch.
    StaleSession,
    /// A later dispatch for the same style owns the slot.
    Superseded,
    UnknownStyle,
}

#[derive(Debug)]
struct Slot {
    task: GenerationTask,
    latest_dispatch: u64,
}

#[derive(Debug, Default)]
pub struct TaskStore {
    session: u64,
    session_id: Option<Uuid>,
    next_dispatch: u64,
    order: Vec<String>,
    slots: HashMap<String, Slot>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every task with a fresh `Pending` one, one per style id, and
    /// invalidates all tickets issued so far. Returns one ticket per task.
    pub fn reset(&mut self, style_ids: &[String]) -> Vec<DispatchTicket> {
        self.session += 1;
        self.session_id = Some(Uuid::new_v4());
        self.order.clear();
        self.slots.clear();

        let now = Utc::now();
        let mut tickets = Vec::with_capacity(style_ids.len());
        for style_id in style_ids {
            if self.slots.contains_key(style_id) {
                continue;
            }
            let seq = self.bump();
            self.order.push(style_id.clone());
            self.slots.insert(style_id.clone(), Slot {
                task: GenerationTask { id: Uuid::new_v4(), style_id: style_id.clone(), state: TaskState::Pending, updated_at: now },
                latest_dispatch: seq,
            });
            tickets.push(DispatchTicket { session: self.session, style_id: style_id.clone(), seq });
        }
        tickets
    }

    /// Moves a task back to `Pending` for a new dispatch. `None` when the
    /// style has no task in the current session.
    pub fn set_pending(&mut self, style_id: &str) -> Option<DispatchTicket> {
        if !self.slots.contains_key(style_id) {
            return None;
        }
        let seq = self.bump();
        let slot = self.slots.get_mut(style_id)?;
        slot.latest_dispatch = seq;
        slot.task.state = TaskState::Pending;
        slot.task.updated_at = Utc::now();
        Some(DispatchTicket { session: self.session, style_id: style_id.to_string(), seq })
    }

    pub fn set_result(&mut self, ticket: &DispatchTicket, result: Result<String, String>) -> WriteOutcome {
        if ticket.session != self.session {
            return WriteOutcome::StaleSession;
        }
        let Some(slot) = self.slots.get_mut(&ticket.style_id) else {
            return WriteOutcome::UnknownStyle;
        };
        if slot.latest_dispatch != ticket.seq || !slot.task.state.is_pending() {
            return WriteOutcome::Superseded;
        }
        slot.task.state = match result {
            Ok(image) => TaskState::Succeeded(image),
            Err(message) => TaskState::Failed(message),
        };
        slot.task.updated_at = Utc::now();
        WriteOutcome::Applied
    }

    pub fn snapshot(&self) -> Vec<GenerationTask> {
        self.order.iter().filter_map(|id| self.slots.get(id)).map(|s| s.task.clone()).collect()
    }

    pub fn get(&self, style_id: &str) -> Option<&GenerationTask> {
        self.slots.get(style_id).map(|s| &s.task)
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn phase(&self) -> SessionPhase {
        if self.slots.is_empty() {
            SessionPhase::Idle
        } else if self.slots.values().any(|s| s.task.state.is_pending()) {
            SessionPhase::Dispatching
        } else {
            SessionPhase::Settled
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_dispatch += 1;
        self.next_dispatch
    }
}
