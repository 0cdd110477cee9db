use chrono::{DateTime, Utc};

/// Cached collections refreshed from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Requests,
    Donations,
    Banks,
    Notifications,
}

impl Collection {
    pub(crate) fn index(self) -> usize {
        match self {
            Collection::Requests => 0,
            Collection::Donations => 1,
            Collection::Banks => 2,
            Collection::Notifications => 3,
        }
    }
}

/// Change notifications broadcast to UI observers.
#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    UserChanged,
    AppDataChanged,
    CollectionRefreshed(Collection),
    Synced { at: DateTime<Utc> },
    SessionCleared,
}
