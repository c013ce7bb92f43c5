use std::fmt::{self, Debug, Formatter};

/// A single occurrence delivered on a [`Signal`](crate::Signal).
///
/// Three of the four variants are terminal: once one of them has been
/// observed, no further event of any kind follows on that signal.
pub enum Event<V, E> {
	/// A value produced by the stream. Never terminal.
	Value(V),
	/// The stream failed with a typed error. Terminal.
	Failed(E),
	/// The stream finished normally. Terminal.
	Completed,
	/// The stream was cancelled before it could finish. Terminal.
	Interrupted,
}

impl<V, E> Event<V, E> {
	/// `true` for every variant except [`Value`](Event::Value).
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Event::Value(_))
	}

	/// Borrows the contained value, if this is a [`Value`](Event::Value) event.
	pub fn value(&self) -> Option<&V> {
		match self {
			Event::Value(v) => Some(v),
			_ => None,
		}
	}

	/// Transforms a contained value, leaving terminals untouched.
	pub fn map<V2>(self, f: impl FnOnce(V) -> V2) -> Event<V2, E> {
		match self {
			Event::Value(v) => Event::Value(f(v)),
			Event::Failed(e) => Event::Failed(e),
			Event::Completed => Event::Completed,
			Event::Interrupted => Event::Interrupted,
		}
	}

	/// Transforms a contained failure, leaving values and other terminals untouched.
	pub fn map_error<E2>(self, f: impl FnOnce(E) -> E2) -> Event<V, E2> {
		match self {
			Event::Value(v) => Event::Value(v),
			Event::Failed(e) => Event::Failed(f(e)),
			Event::Completed => Event::Completed,
			Event::Interrupted => Event::Interrupted,
		}
	}

	/// Turns any event into a `Value` carrying the event itself, never terminal.
	///
	/// Used by the `materialize` operator: the materialized signal never fails or
	/// completes on its own account, it reports the original terminal as one last
	/// value and then completes.
	pub fn materialize(self) -> Event<Event<V, E>, E> {
		Event::Value(self)
	}
}

impl<V, E> Clone for Event<V, E>
where
	V: Clone,
	E: Clone,
{
	fn clone(&self) -> Self {
		match self {
			Event::Value(v) => Event::Value(v.clone()),
			Event::Failed(e) => Event::Failed(e.clone()),
			Event::Completed => Event::Completed,
			Event::Interrupted => Event::Interrupted,
		}
	}
}

impl<V, E> Debug for Event<V, E>
where
	V: Debug,
	E: Debug,
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Event::Value(v) => f.debug_tuple("Value").field(v).finish(),
			Event::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
			Event::Completed => f.write_str("Completed"),
			Event::Interrupted => f.write_str("Interrupted"),
		}
	}
}

impl<V, E> PartialEq for Event<V, E>
where
	V: PartialEq,
	E: PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Event::Value(a), Event::Value(b)) => a == b,
			(Event::Failed(a), Event::Failed(b)) => a == b,
			(Event::Completed, Event::Completed) => true,
			(Event::Interrupted, Event::Interrupted) => true,
			_ => false,
		}
	}
}

/// An uninhabited type used as `E` for signals that are statically known never to fail.
///
/// Mirrors the role Swift's `Never` plays in the original design: a stream typed
/// `Event<V, Never>` cannot produce a `Failed` event, which the type system enforces
/// rather than a runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Never {}
