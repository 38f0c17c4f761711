use std::mem;

use super::{delete_all, Blobs, ObjectKey};

/// Objects written during a request that must be removed unless the guard is
/// disarmed.
///
/// Call [`Rollback::run`] on a failure path to delete them before responding.
/// If the guard is dropped while still holding keys (for example because the
/// request future was cancelled), deletion continues on a spawned task.
pub struct Rollback {
	store: Blobs,
	keys: Vec<ObjectKey>,
}

impl Rollback {
	pub fn new(store: Blobs) -> Self {
		Self {
			store,
			keys: Vec::new(),
		}
	}

	pub fn push(&mut self, key: ObjectKey) {
		self.keys.push(key);
	}

	/// Stops tracking the objects written so far and hands them to the caller.
	/// Dropping the guard afterwards deletes nothing.
	pub fn disarm(mut self) -> Vec<ObjectKey> {
		mem::take(&mut self.keys)
	}

	/// Deletes every object written so far, in upload order.
	pub async fn run(mut self) {
		let keys = mem::take(&mut self.keys);

		delete_all(&*self.store, keys).await;
	}
}

impl Drop for Rollback {
	fn drop(&mut self) {
		if self.keys.is_empty() {
			return;
		}

		let keys = mem::take(&mut self.keys);
		let store = self.store.clone();

		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move { delete_all(&*store, keys).await });
			}
			Err(..) => {
				tracing::warn!(count = keys.len(), "no runtime left to delete orphaned objects");
			}
		}
	}
}
