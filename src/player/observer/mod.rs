use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies the player a notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(u64);

impl PlayerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// Listener for changes of the player's playable flag.
///
/// Called synchronously on the thread where the change happened: the
/// decode thread for load results, the delivery thread at end of stream,
/// and the caller's thread for `stop`.
pub trait PlayerObserver: Send + Sync {
    fn on_playable_changed(&self, player: PlayerId, is_playable: bool);
}

/// Holds at most one observer without keeping it alive.
#[derive(Default)]
pub struct ObserverSlot {
    inner: Mutex<Option<Weak<dyn PlayerObserver>>>,
}

impl ObserverSlot {
    pub fn set<O: PlayerObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Arc<dyn PlayerObserver> = observer.clone();
        *self.inner.lock() = Some(Arc::downgrade(&observer));
    }

    pub fn clear(&self) {
        *self.inner.lock() = None;
    }

    /// Delivers a notification if the observer is still alive.
    /// Returns whether anyone received it.
    pub fn notify(&self, player: PlayerId, is_playable: bool) -> bool {
        // Upgrade outside the callback so the observer may replace itself.
        let observer = self.inner.lock().as_ref().and_then(Weak::upgrade);
        match observer {
            Some(observer) => {
                observer.on_playable_changed(player, is_playable);
                true
            }
            None => false,
        }
    }
}
