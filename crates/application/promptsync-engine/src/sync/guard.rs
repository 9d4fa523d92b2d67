use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use promptsync_core::{SyncDirection, SyncId};
use tokio_util::sync::CancellationToken;

use crate::sync::{GuardScope, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Any,
    Only(SyncDirection),
}

struct InFlight {
    id: SyncId,
    direction: SyncDirection,
    token: CancellationToken,
}

/// The in-memory "current sync id" per guard slot.
///
/// Holding an [`InFlightTicket`] is what makes an operation current; the
/// stored status records are never consulted.
pub(crate) struct InFlightRegistry {
    scope: GuardScope,
    slots: Mutex<HashMap<Slot, InFlight>>,
}

impl InFlightRegistry {
    pub(crate) fn new(scope: GuardScope) -> Self {
        Self {
            scope,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, direction: SyncDirection) -> Slot {
        match self.scope {
            GuardScope::Shared => Slot::Any,
            GuardScope::PerDirection => Slot::Only(direction),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Slot, InFlight>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn try_acquire(
        self: &Arc<Self>,
        direction: SyncDirection,
        id: SyncId,
        token: CancellationToken,
    ) -> Result<InFlightTicket, SyncError> {
        let slot = self.slot(direction);
        let mut slots = self.lock();
        if let Some(running) = slots.get(&slot) {
            return Err(SyncError::AlreadyRunning {
                running: running.direction,
            });
        }
        slots.insert(
            slot,
            InFlight {
                id: id.clone(),
                direction,
                token,
            },
        );
        Ok(InFlightTicket {
            registry: Arc::clone(self),
            slot,
            id,
        })
    }

    pub(crate) fn current(&self, direction: SyncDirection) -> Option<SyncId> {
        self.lock()
            .values()
            .find(|f| f.direction == direction)
            .map(|f| f.id.clone())
    }

    /// Cancel the in-flight operation of `direction`, if any.
    pub(crate) fn cancel(&self, direction: SyncDirection) -> bool {
        match self.lock().values().find(|f| f.direction == direction) {
            Some(f) => {
                f.token.cancel();
                true
            }
            None => false,
        }
    }

    fn release(&self, slot: Slot, id: &SyncId) {
        let mut slots = self.lock();
        if slots.get(&slot).is_some_and(|f| &f.id == id) {
            slots.remove(&slot);
        }
    }
}

/// Keeps an operation current until dropped.
pub(crate) struct InFlightTicket {
    registry: Arc<InFlightRegistry>,
    slot: Slot,
    id: SyncId,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.registry.release(self.slot, &self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(scope: GuardScope) -> Arc<InFlightRegistry> {
        Arc::new(InFlightRegistry::new(scope))
    }

    #[test]
    fn second_acquire_in_same_direction_is_rejected() {
        let reg = registry(GuardScope::PerDirection);
        let _ticket = reg
            .try_acquire(SyncDirection::Push, SyncId::from("1"), CancellationToken::new())
            .unwrap();
        let err = reg
            .try_acquire(SyncDirection::Push, SyncId::from("2"), CancellationToken::new())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SyncError::AlreadyRunning {
                running: SyncDirection::Push
            }
        ));
        assert_eq!(reg.current(SyncDirection::Push), Some(SyncId::from("1")));
    }

    #[test]
    fn per_direction_allows_push_and_pull_together() {
        let reg = registry(GuardScope::PerDirection);
        let _push = reg
            .try_acquire(SyncDirection::Push, SyncId::from("1"), CancellationToken::new())
            .unwrap();
        assert!(reg
            .try_acquire(SyncDirection::Pull, SyncId::from("2"), CancellationToken::new())
            .is_ok());
    }

    #[test]
    fn shared_scope_blocks_other_direction() {
        let reg = registry(GuardScope::Shared);
        let _push = reg
            .try_acquire(SyncDirection::Push, SyncId::from("1"), CancellationToken::new())
            .unwrap();
        let err = reg
            .try_acquire(SyncDirection::Pull, SyncId::from("2"), CancellationToken::new())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SyncError::AlreadyRunning {
                running: SyncDirection::Push
            }
        ));
        assert_eq!(reg.current(SyncDirection::Pull), None);
    }

    #[test]
    fn dropping_ticket_releases_slot() {
        let reg = registry(GuardScope::Shared);
        let ticket = reg
            .try_acquire(SyncDirection::Pull, SyncId::from("1"), CancellationToken::new())
            .unwrap();
        drop(ticket);
        assert_eq!(reg.current(SyncDirection::Pull), None);
        assert!(reg
            .try_acquire(SyncDirection::Push, SyncId::from("2"), CancellationToken::new())
            .is_ok());
    }

    #[test]
    fn cancel_fires_the_operation_token() {
        let reg = registry(GuardScope::Shared);
        let token = CancellationToken::new();
        let _ticket = reg
            .try_acquire(SyncDirection::Push, SyncId::from("1"), token.clone())
            .unwrap();
        assert!(!reg.cancel(SyncDirection::Pull));
        assert!(reg.cancel(SyncDirection::Push));
        assert!(token.is_cancelled());
    }
}
