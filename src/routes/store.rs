use tokio::sync::watch;

use crate::engine::RouteRejection;
use crate::models::{RouteId, RouteSet, RouteUpdateReason};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteStoreSnapshot {
    pub routes: RouteSet,
    /// Routes the engine refused in the update that produced `routes`.
    pub ignored: Vec<RouteRejection>,
    pub last_reason: Option<RouteUpdateReason>,
}

/// Current route set. Only the owner can replace it; everyone else reads
/// through a [`RouteStoreReader`].
pub struct RouteStore {
    tx: watch::Sender<RouteStoreSnapshot>,
}

impl RouteStore {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(RouteStoreSnapshot::default());
        Self { tx }
    }

    pub fn reader(&self) -> RouteStoreReader {
        RouteStoreReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> RouteStoreSnapshot {
        self.tx.borrow().clone()
    }

    pub fn routes(&self) -> RouteSet {
        self.tx.borrow().routes.clone()
    }

    pub fn primary_id(&self) -> Option<RouteId> {
        self.tx.borrow().routes.primary_id().cloned()
    }

    pub(crate) fn replace(
        &mut self,
        routes: RouteSet,
        ignored: Vec<RouteRejection>,
        reason: RouteUpdateReason,
    ) {
        self.tx.send_replace(RouteStoreSnapshot {
            routes,
            ignored,
            last_reason: Some(reason),
        });
    }
}

/// Read-only view of the [`RouteStore`].
#[derive(Clone)]
pub struct RouteStoreReader {
    rx: watch::Receiver<RouteStoreSnapshot>,
}

impl RouteStoreReader {
    pub fn snapshot(&self) -> RouteStoreSnapshot {
        self.rx.borrow().clone()
    }

    pub fn routes(&self) -> RouteSet {
        self.rx.borrow().routes.clone()
    }

    pub fn primary_id(&self) -> Option<RouteId> {
        self.rx.borrow().routes.primary_id().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Route;

    #[test]
    fn readers_see_replacements() {
        let mut store = RouteStore::new();
        let reader = store.reader();
        assert!(reader.routes().is_empty());

        store.replace(
            RouteSet::new(vec![Route::new("a", vec![]), Route::new("b", vec![])]),
            vec![RouteRejection {
                route_id: RouteId::new("c"),
                reason: "invalid".into(),
            }],
            RouteUpdateReason::NewRoutes {
                initial_leg_index: 0,
            },
        );

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.routes.len(), 2);
        assert_eq!(snapshot.ignored.len(), 1);
        assert_eq!(reader.primary_id(), Some(RouteId::new("a")));
        assert_eq!(store.snapshot(), snapshot);
    }
}
