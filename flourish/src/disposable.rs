use std::{
	fmt::{self, Debug, Formatter},
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use parking_lot::Mutex;

/// An idempotent, thread-safe cancellation/teardown token.
///
/// All implementors must make `dispose` safe to call concurrently and any
/// number of times: only the first call has an effect, every later call (from
/// any thread) is a no-op.
pub trait Disposable: Send + Sync {
	/// Tears this disposable down. Idempotent.
	fn dispose(&self);
	/// `true` once `dispose` has run (for this or any racing caller).
	fn is_disposed(&self) -> bool;
	/// Registers `f` to run once `dispose()` actually tears this disposable
	/// down. If it has already been disposed, `f` runs immediately and
	/// synchronously, right here. Used by [`Lifetime::from_disposable`](crate::Lifetime::from_disposable)
	/// to end a lifetime exactly when an arbitrary, pre-existing disposable
	/// is disposed.
	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>);
}

impl Disposable for Arc<dyn Disposable> {
	fn dispose(&self) {
		(**self).dispose();
	}

	fn is_disposed(&self) -> bool {
		(**self).is_disposed()
	}

	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>) {
		(**self).on_disposed(f);
	}
}

/// Shared bookkeeping for the "run these once, exactly when disposed" half of
/// every concrete disposable below.
struct Notifier {
	disposed: AtomicBool,
	callbacks: Mutex<Option<Vec<Box<dyn FnOnce() + Send>>>>,
}

impl Notifier {
	fn new() -> Self {
		Self {
			disposed: AtomicBool::new(false),
			callbacks: Mutex::new(Some(Vec::new())),
		}
	}

	fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	/// Marks this notifier disposed (idempotently) and returns the callbacks to
	/// run, or `None` if some other caller already won the race to dispose.
	fn mark_disposed(&self) -> Option<Vec<Box<dyn FnOnce() + Send>>> {
		if self.disposed.swap(true, Ordering::AcqRel) {
			return None;
		}
		Some(self.callbacks.lock().take().unwrap_or_default())
	}

	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>) {
		if self.is_disposed() {
			f();
			return;
		}
		let mut guard = self.callbacks.lock();
		match guard.as_mut() {
			Some(callbacks) => callbacks.push(f),
			// Disposed between the `is_disposed` check above and taking this lock.
			None => {
				drop(guard);
				f();
			}
		}
	}
}

fn run_callbacks(callbacks: Option<Vec<Box<dyn FnOnce() + Send>>>) {
	for f in callbacks.into_iter().flatten() {
		f();
	}
}

/// Disposes nothing; used where an API requires a disposable but a generator
/// had none to return, or a subscription to an already-terminated signal has
/// no registry entry to remove.
pub struct NopDisposable;

impl Disposable for NopDisposable {
	fn dispose(&self) {}

	fn is_disposed(&self) -> bool {
		true
	}

	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>) {
		f();
	}
}

/// Runs a single action, once, the first time `dispose` is called.
pub struct ActionDisposable {
	notifier: Notifier,
	action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ActionDisposable {
	/// Wraps `action` so it runs at most once, on the first `dispose()`.
	pub fn new(action: impl FnOnce() + Send + 'static) -> Arc<Self> {
		Arc::new(Self {
			notifier: Notifier::new(),
			action: Mutex::new(Some(Box::new(action))),
		})
	}
}

impl Disposable for ActionDisposable {
	fn dispose(&self) {
		let Some(callbacks) = self.notifier.mark_disposed() else {
			return;
		};
		if let Some(action) = self.action.lock().take() {
			action();
		}
		run_callbacks(Some(callbacks));
	}

	fn is_disposed(&self) -> bool {
		self.notifier.is_disposed()
	}

	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>) {
		self.notifier.on_disposed(f);
	}
}

impl Debug for ActionDisposable {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActionDisposable")
			.field("disposed", &self.is_disposed())
			.finish()
	}
}

/// Owns a set of child disposables. Disposing disposes every child exactly
/// once and clears the set; children added after disposal are disposed
/// immediately instead of being retained.
pub struct CompositeDisposable {
	notifier: Notifier,
	children: Mutex<Option<Vec<Arc<dyn Disposable>>>>,
}

impl CompositeDisposable {
	/// An empty composite disposable.
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			notifier: Notifier::new(),
			children: Mutex::new(Some(Vec::new())),
		})
	}

	/// Adds `child`, or disposes it immediately if this composite is already disposed.
	pub fn add(&self, child: Arc<dyn Disposable>) {
		let mut guard = self.children.lock();
		match guard.as_mut() {
			Some(children) => children.push(child),
			None => {
				drop(guard);
				child.dispose();
			}
		}
	}
}

impl Disposable for CompositeDisposable {
	fn dispose(&self) {
		let Some(callbacks) = self.notifier.mark_disposed() else {
			return;
		};
		if let Some(children) = self.children.lock().take() {
			for child in children {
				child.dispose();
			}
		}
		run_callbacks(Some(callbacks));
	}

	fn is_disposed(&self) -> bool {
		self.notifier.is_disposed()
	}

	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>) {
		self.notifier.on_disposed(f);
	}
}

/// `+=` in spec terms: add a child disposable to a [`CompositeDisposable`].
impl std::ops::AddAssign<Arc<dyn Disposable>> for Arc<CompositeDisposable> {
	fn add_assign(&mut self, rhs: Arc<dyn Disposable>) {
		self.add(rhs);
	}
}

/// Owns at most one inner disposable. Setting a new inner disposes the
/// previous one; if the serial disposable is itself already disposed, the
/// replacement is disposed immediately instead of being stored.
pub struct SerialDisposable {
	notifier: Notifier,
	inner: Mutex<Option<Arc<dyn Disposable>>>,
}

impl SerialDisposable {
	/// A serial disposable with no inner disposable set.
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			notifier: Notifier::new(),
			inner: Mutex::new(None),
		})
	}

	/// Replaces the inner disposable, disposing the one being replaced.
	///
	/// If this serial disposable has already been disposed, `new_inner` is
	/// disposed immediately and not retained.
	pub fn set(&self, new_inner: Arc<dyn Disposable>) {
		if self.notifier.is_disposed() {
			new_inner.dispose();
			return;
		}
		let previous = self.inner.lock().replace(new_inner);
		if let Some(previous) = previous {
			previous.dispose();
		}
	}
}

impl Disposable for SerialDisposable {
	fn dispose(&self) {
		let Some(callbacks) = self.notifier.mark_disposed() else {
			return;
		};
		if let Some(inner) = self.inner.lock().take() {
			inner.dispose();
		}
		run_callbacks(Some(callbacks));
	}

	fn is_disposed(&self) -> bool {
		self.notifier.is_disposed()
	}

	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>) {
		self.notifier.on_disposed(f);
	}
}

/// Runs an action exactly once, when this value is dropped (by scope exit,
/// `dispose()`, or both — whichever comes first).
///
/// Built on [`scopeguard`], the same crate the teacher's runtime uses for its
/// own "run this on unwind or on normal exit" guards.
pub struct ScopedDisposable {
	notifier: Notifier,
	guard: Mutex<Option<scopeguard::ScopeGuard<(), Box<dyn FnMut(()) + Send>>>>,
}

impl ScopedDisposable {
	/// Schedules `action` to run once, whenever this disposable is dropped or disposed.
	pub fn new(action: impl FnOnce() + Send + 'static) -> Arc<Self> {
		let mut action = Some(action);
		let guard = scopeguard::guard(
			(),
			Box::new(move |()| {
				if let Some(action) = action.take() {
					action();
				}
			}) as Box<dyn FnMut(()) + Send>,
		);
		Arc::new(Self {
			notifier: Notifier::new(),
			guard: Mutex::new(Some(guard)),
		})
	}
}

impl Disposable for ScopedDisposable {
	fn dispose(&self) {
		let Some(callbacks) = self.notifier.mark_disposed() else {
			return;
		};
		// Dropping the guard runs the action.
		self.guard.lock().take();
		run_callbacks(Some(callbacks));
	}

	fn is_disposed(&self) -> bool {
		self.notifier.is_disposed()
	}

	fn on_disposed(&self, f: Box<dyn FnOnce() + Send>) {
		self.notifier.on_disposed(f);
	}
}

impl Drop for ScopedDisposable {
	fn drop(&mut self) {
		self.dispose();
	}
}
