//! An observable scope: an "ended" signal plus a token whose drop ends it.

use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

use parking_lot::Mutex;

use crate::{
	disposable::{ActionDisposable, Disposable},
	event::Never,
	observer::Observer,
	signal::{self, Signal},
};

/// An observable scope. `ended` emits `Completed` exactly once, when the
/// paired [`LifetimeToken`] is dropped (or any constituent lifetime a
/// composed lifetime was built from ends).
#[derive(Clone)]
pub struct Lifetime {
	ended: Signal<(), Never>,
}

/// Sole owner of the disposable backing a [`Lifetime`]. Dropping it ends the
/// lifetime by sending `Completed` on `ended`.
pub struct LifetimeToken {
	disposable: Arc<dyn Disposable>,
}

impl Drop for LifetimeToken {
	fn drop(&mut self) {
		self.disposable.dispose();
	}
}

impl Lifetime {
	/// Builds a fresh lifetime and the token that ends it.
	pub fn make() -> (Self, LifetimeToken) {
		let (signal, observer, _interrupt) = signal::pipe::<(), Never>();
		let disposable = ActionDisposable::new(move || observer.send_completed());
		(
			Self { ended: signal },
			LifetimeToken { disposable },
		)
	}

	/// Builds a lifetime that ends exactly when `disposable` is disposed (and
	/// immediately if it already has been).
	pub fn from_disposable(disposable: Arc<dyn Disposable>) -> Self {
		let (lifetime, token) = Self::make();
		let token = Mutex::new(Some(token));
		disposable.on_disposed(Box::new(move || {
			token.lock().take();
		}));
		lifetime
	}

	/// The signal that emits `Completed` exactly once, when this lifetime ends.
	pub fn ended(&self) -> &Signal<(), Never> {
		&self.ended
	}

	/// `true` once this lifetime has ended.
	pub fn has_ended(&self) -> bool {
		// A terminated signal hands a fresh observer `Interrupted` synchronously
		// instead of registering it, so probing with a throwaway observer is
		// enough to tell whether `ended` has already fired, without leaking a
		// registry entry either way.
		let disposable = self.ended.observe(Observer::new(|_event| {}));
		match disposable {
			Some(disposable) => {
				disposable.dispose();
				false
			}
			None => true,
		}
	}

	/// Composes two lifetimes: the result ends as soon as either input ends
	/// ("AND" of the lifetimes' scopes, per §4.7 — the intersection of the
	/// time both are alive, ending at the first boundary).
	pub fn either(a: &Lifetime, b: &Lifetime) -> Lifetime {
		let (out, token) = Lifetime::make();
		let token = Arc::new(Mutex::new(Some(token)));
		let end_once = {
			let token = Arc::clone(&token);
			move || {
				token.lock().take();
			}
		};
		a.ended.observe_completed(end_once.clone());
		b.ended.observe_completed(end_once);
		out
	}

	/// Composes two lifetimes: the result ends only once both inputs have
	/// ended ("OR" of the lifetimes' scopes, per §4.7 — the union of the time
	/// either is alive).
	pub fn both(a: &Lifetime, b: &Lifetime) -> Lifetime {
		let (out, token) = Lifetime::make();
		let token_holder = Arc::new(Mutex::new(Some(token)));
		let remaining = Arc::new(AtomicU64::new(2));
		let end_if_last = {
			let token_holder = Arc::clone(&token_holder);
			let remaining = Arc::clone(&remaining);
			move || {
				if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
					token_holder.lock().take();
				}
			}
		};
		a.ended.observe_completed(end_if_last.clone());
		b.ended.observe_completed(end_if_last);
		out
	}
}
