use std::sync::Arc;

use crate::event::Event;

/// A sink that accepts [`Event`]s.
///
/// An observer is just a `send` function with convenience wrappers. Wrapping an
/// observer to filter, map, or gate its calls (as every operator in this crate
/// does) is invisible to whatever is downstream: it too just sees an `Observer`.
pub struct Observer<V, E> {
	send: Arc<dyn Fn(Event<V, E>) + Send + Sync>,
}

impl<V, E> Clone for Observer<V, E> {
	fn clone(&self) -> Self {
		Self {
			send: Arc::clone(&self.send),
		}
	}
}

impl<V, E> Observer<V, E> {
	/// Builds an observer from a single dispatch function.
	///
	/// Calling `send` after a terminal event has already gone through the same
	/// `Observer` value is left up to the caller: [`Signal`](crate::Signal)'s
	/// internal observer enforces the at-most-one-terminal invariant; a bare
	/// `Observer` built here does not by itself.
	pub fn new(send: impl Fn(Event<V, E>) + Send + Sync + 'static) -> Self {
		Self {
			send: Arc::new(send),
		}
	}

	/// Builds an observer from one callback per event variant.
	pub fn with_handlers(
		on_value: impl FnMut(V) + Send + 'static,
		on_failed: impl FnMut(E) + Send + 'static,
		on_completed: impl FnMut() + Send + 'static,
		on_interrupted: impl FnMut() + Send + 'static,
	) -> Self
	where
		V: Send,
		E: Send,
	{
		// A single mutex around all four callbacks, not one per callback: dispatch
		// for one signal is already serialized by the send slot, so this only
		// needs to give each captured `FnMut` interior mutability, not guard
		// against real concurrent access.
		let handlers = parking_lot::Mutex::new((on_value, on_failed, on_completed, on_interrupted));
		Self::new(move |event| {
			let (on_value, on_failed, on_completed, on_interrupted) = &mut *handlers.lock();
			match event {
				Event::Value(v) => on_value(v),
				Event::Failed(e) => on_failed(e),
				Event::Completed => on_completed(),
				Event::Interrupted => on_interrupted(),
			}
		})
	}

	/// Dispatches an event through this observer's `send` function.
	pub fn send(&self, event: Event<V, E>) {
		(self.send)(event);
	}

	/// Convenience for `send(Event::Value(value))`.
	pub fn send_value(&self, value: V) {
		self.send(Event::Value(value));
	}

	/// Convenience for `send(Event::Failed(error))`.
	pub fn send_failed(&self, error: E) {
		self.send(Event::Failed(error));
	}

	/// Convenience for `send(Event::Completed)`.
	pub fn send_completed(&self) {
		self.send(Event::Completed);
	}

	/// Convenience for `send(Event::Interrupted)`.
	pub fn send_interrupted(&self) {
		self.send(Event::Interrupted);
	}

	/// Wraps this observer in one that applies `f` to every value before forwarding.
	pub fn contramap<V2>(&self, f: impl Fn(V2) -> V + Send + Sync + 'static) -> Observer<V2, E>
	where
		V: 'static,
		E: 'static,
	{
		let this = self.clone();
		Observer::new(move |event| this.send(event.map(&f)))
	}
}

impl<V: 'static, E: 'static> Observer<V, E> {
	/// An observer that discards every event.
	pub fn sink() -> Self {
		Self::new(|_| {})
	}
}
