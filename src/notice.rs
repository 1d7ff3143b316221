//! Change notices raised after every successful refresh and the listener registry that fans
//! them out.
//!
//! Delivery is synchronous and in-process: each registered listener is called once per
//! committed refresh, in registration order, on the task that performed the refresh. Notices
//! are not persisted, so processes that lost the lock race observe the new value through the
//! store instead.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::{CredentialKind, OwnerId, TokenSecret},
};

/// Notice emitted once per successful refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeNotice {
	/// Owner whose credential changed.
	pub owner_id: OwnerId,
	/// Which credential changed.
	pub kind: CredentialKind,
	/// Freshly committed value.
	pub new_value: TokenSecret,
}

/// Receiver of [`ChangeNotice`]s.
pub trait ChangeListener
where
	Self: Send + Sync,
{
	/// Handles one notice; called synchronously by the refreshing task.
	fn notify(&self, notice: &ChangeNotice);
}
impl<F> ChangeListener for F
where
	F: Fn(&ChangeNotice) + Send + Sync,
{
	fn notify(&self, notice: &ChangeNotice) {
		self(notice)
	}
}

/// Handle returned by [`ChangeListeners::add`], used to unregister a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered registry of change listeners.
#[derive(Default)]
pub struct ChangeListeners {
	next_id: AtomicU64,
	entries: RwLock<Vec<(ListenerId, Arc<dyn ChangeListener>)>>,
}
impl ChangeListeners {
	/// Registers a listener at the end of the delivery order.
	pub fn add(&self, listener: impl ChangeListener + 'static) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));

		self.entries.write().push((id, Arc::new(listener)));

		id
	}

	/// Unregisters a listener; returns `false` if it was not registered.
	pub fn remove(&self, id: ListenerId) -> bool {
		let mut entries = self.entries.write();
		let before = entries.len();

		entries.retain(|(entry_id, _)| *entry_id != id);

		entries.len() != before
	}

	/// Unregisters every listener.
	pub fn clear(&self) {
		self.entries.write().clear();
	}

	/// Number of registered listeners.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when no listener is registered.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Delivers a notice to every listener in registration order; returns how many were called.
	///
	/// The registry lock is released before delivery, so listeners may add or remove
	/// listeners; such changes take effect from the next notice.
	pub fn notify(&self, notice: &ChangeNotice) -> usize {
		let snapshot: Vec<_> =
			self.entries.read().iter().map(|(_, listener)| Arc::clone(listener)).collect();

		for listener in &snapshot {
			listener.notify(notice);
		}

		snapshot.len()
	}
}
impl Debug for ChangeListeners {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ChangeListeners").field("len", &self.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn notice(value: &str) -> ChangeNotice {
		ChangeNotice {
			owner_id: OwnerId::new("wx-app").expect("Owner fixture should be valid."),
			kind: CredentialKind::Dependent,
			new_value: TokenSecret::new(value),
		}
	}

	#[test]
	fn delivers_in_registration_order() {
		let listeners = ChangeListeners::default();
		let seen = Arc::new(Mutex::new(Vec::new()));

		for label in ["first", "second", "third"] {
			let seen = Arc::clone(&seen);

			listeners.add(move |notice: &ChangeNotice| {
				seen.lock().push(format!("{label}:{}", notice.new_value.expose()));
			});
		}

		assert_eq!(listeners.notify(&notice("t-1")), 3);
		assert_eq!(*seen.lock(), vec!["first:t-1", "second:t-1", "third:t-1"]);
	}

	#[test]
	fn removed_listeners_stop_receiving() {
		let listeners = ChangeListeners::default();
		let calls = Arc::new(AtomicU64::new(0));
		let counter = Arc::clone(&calls);
		let id = listeners.add(move |_: &ChangeNotice| {
			counter.fetch_add(1, Ordering::SeqCst);
		});

		listeners.notify(&notice("a"));

		assert!(listeners.remove(id));
		assert!(!listeners.remove(id));

		listeners.notify(&notice("b"));

		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn clear_drops_every_listener() {
		let listeners = ChangeListeners::default();

		listeners.add(|_: &ChangeNotice| {});
		listeners.add(|_: &ChangeNotice| {});

		assert_eq!(listeners.len(), 2);

		listeners.clear();

		assert!(listeners.is_empty());
		assert_eq!(listeners.notify(&notice("c")), 0);
	}
}
