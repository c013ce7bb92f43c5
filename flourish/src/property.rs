//! A value cell plus its change stream (§4.10): the common "current value,
//! plus everything that happens to it from here on" shape layered on top of
//! [`Signal`].

use std::{
	sync::Arc,
	thread::{self, ThreadId},
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
	disposable::{Disposable, SerialDisposable},
	event::Never,
	observer::Observer,
	producer::SignalProducer,
	signal::{self, Signal},
};

/// Returned by [`MutableProperty::modify`] when `f` re-enters `modify` on the
/// same property from inside itself. A programming fault per §7 ("usage
/// faults"), not a stream failure — it never appears as an `E`.
#[derive(Debug, Error)]
#[error("MutableProperty::modify called recursively on the same property")]
pub struct RecursiveModifyError;

struct ReadOnlyInner<V> {
	current: Box<dyn Fn() -> V + Send + Sync>,
	signal: Signal<V, Never>,
	/// Keeps a base property's self-updating subscription to its own backing
	/// signal alive for as long as the property is; unused by derivations,
	/// whose `current` recomputes from their sources directly instead of
	/// caching anything off `signal`.
	_subscription: Option<Arc<dyn Disposable>>,
}

/// A read-only value cell plus its change stream.
///
/// Cloning a `Property` clones the handle: every clone reads the same
/// current value and observes the same `signal`.
pub struct Property<V> {
	inner: Arc<ReadOnlyInner<V>>,
}

impl<V> Clone for Property<V> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<V: 'static + Send + Clone> Property<V> {
	/// Wraps a generator producing `(initial, signal)`, synchronously.
	///
	/// The property keeps its own internal subscription to `signal` for as
	/// long as it exists, so that [`value`](Self::value) always reflects the
	/// most recent event even if nobody else is observing `signal` directly.
	pub fn new(generator: impl FnOnce() -> (V, Signal<V, Never>)) -> Self {
		let (initial, signal) = generator();
		Self::from_initial_and_signal(initial, signal)
	}

	fn from_initial_and_signal(initial: V, signal: Signal<V, Never>) -> Self {
		let cell = Arc::new(Mutex::new(initial));
		let subscription = {
			let cell = Arc::clone(&cell);
			signal.observe_values(move |v| *cell.lock() = v)
		};
		let current = {
			let cell = Arc::clone(&cell);
			move || cell.lock().clone()
		};
		Self {
			inner: Arc::new(ReadOnlyInner {
				current: Box::new(current),
				signal,
				_subscription: subscription,
			}),
		}
	}

	/// A property whose value never changes: its signal never emits.
	pub fn constant(value: V) -> Self {
		Self::from_initial_and_signal(value, Signal::new(|_observer| None))
	}

	/// Wraps a foreign getter with no change stream of its own (for adapting
	/// a source this crate doesn't drive, analogous to `Property(capturing:)`
	/// over e.g. a KVO-style external getter). `signal` never emits.
	pub fn capturing(getter: impl Fn() -> V + Send + Sync + 'static) -> Self {
		Self {
			inner: Arc::new(ReadOnlyInner {
				current: Box::new(getter),
				signal: Signal::new(|_observer| None),
				_subscription: None,
			}),
		}
	}

	/// The current value, computed fresh on every call.
	pub fn value(&self) -> V {
		(self.inner.current)()
	}

	/// The change stream: future values only, not the current one.
	pub fn signal(&self) -> &Signal<V, Never> {
		&self.inner.signal
	}

	/// A producer that, per run, synchronously emits the current value and
	/// then forwards every subsequent change.
	pub fn producer(&self) -> SignalProducer<V, Never> {
		let this = self.clone();
		SignalProducer::new(move |observer, _lifetime| {
			observer.send_value(this.value());
			this.signal().observe(observer)
		})
	}

	/// A derived, read-only property whose value is `f` applied to this
	/// property's current value, recomputed on every access (not cached),
	/// and whose signal mirrors `self.signal().map(f)`.
	pub fn map<V2: 'static + Send + Clone>(
		&self,
		f: impl Fn(V) -> V2 + Send + Sync + 'static,
	) -> Property<V2> {
		let f = Arc::new(f);
		let source = self.clone();
		let current = {
			let f = Arc::clone(&f);
			move || f(source.value())
		};
		let signal = {
			let f = Arc::clone(&f);
			self.signal().map(move |v| f(v))
		};
		Property {
			inner: Arc::new(ReadOnlyInner {
				current: Box::new(current),
				signal,
				_subscription: None,
			}),
		}
	}

	/// A derived property pairing this property's value with `other`'s,
	/// mirroring [`crate::operators::combine_latest`] on the two backing
	/// signals: emits once both have changed at least once, then on every
	/// later change from either.
	pub fn combine_latest<V2: 'static + Send + Clone>(
		&self,
		other: &Property<V2>,
	) -> Property<(V, V2)> {
		let a = self.clone();
		let b = other.clone();
		let current = move || (a.value(), b.value());
		let signal = crate::operators::combine_latest(self.signal(), other.signal());
		Property {
			inner: Arc::new(ReadOnlyInner {
				current: Box::new(current),
				signal,
				_subscription: None,
			}),
		}
	}

	/// A derived property pairing this property's value with `other`'s,
	/// mirroring [`crate::operators::zip`] on the two backing signals.
	pub fn zip<V2: 'static + Send + Clone>(&self, other: &Property<V2>) -> Property<(V, V2)> {
		let a = self.clone();
		let b = other.clone();
		let current = move || (a.value(), b.value());
		let signal = crate::operators::zip(self.signal(), other.signal());
		Property {
			inner: Arc::new(ReadOnlyInner {
				current: Box::new(current),
				signal,
				_subscription: None,
			}),
		}
	}

	/// A derived property whose signal drops consecutive changes `eq`
	/// considers equal; `value` itself is unaffected (it always reflects
	/// whatever the source's value currently is).
	pub fn skip_repeats(&self, eq: impl Fn(&V, &V) -> bool + Send + Sync + 'static) -> Property<V> {
		let source = self.clone();
		let current = move || source.value();
		let signal = self.signal().skip_repeats(eq);
		Property {
			inner: Arc::new(ReadOnlyInner {
				current: Box::new(current),
				signal,
				_subscription: None,
			}),
		}
	}
}

/// Adapts a binding source (`target <~ source` in the source spec's
/// notation) to the producer [`MutableProperty::bind`] actually drives.
/// Implemented for [`Signal`], [`SignalProducer`], and [`Property`] so
/// `bind` accepts any of the three without the caller converting by hand.
pub trait BindSource<V: 'static + Send + Clone> {
	/// Converts this source into the producer `bind` starts.
	fn into_producer(self) -> SignalProducer<V, Never>;
}

impl<V: 'static + Send + Clone> BindSource<V> for Signal<V, Never> {
	fn into_producer(self) -> SignalProducer<V, Never> {
		SignalProducer::new(move |observer, _lifetime| self.observe(observer))
	}
}

impl<V: 'static + Send + Clone> BindSource<V> for SignalProducer<V, Never> {
	fn into_producer(self) -> SignalProducer<V, Never> {
		self
	}
}

impl<V: 'static + Send + Clone> BindSource<V> for Property<V> {
	fn into_producer(self) -> SignalProducer<V, Never> {
		self.producer()
	}
}

struct MutableInner<V> {
	value: Mutex<V>,
	/// The thread currently inside `modify`'s callback, if any — lets a
	/// reentrant call from the same thread fail fast with
	/// [`RecursiveModifyError`] instead of deadlocking on `value`.
	modify_owner: Mutex<Option<ThreadId>>,
	observer: Observer<V, Never>,
	signal: Signal<V, Never>,
	/// The producer currently bound via [`MutableProperty::bind`], if any;
	/// replacing it disposes the previous binding, and it is disposed when
	/// the property itself is dropped.
	binding: Arc<SerialDisposable>,
}

impl<V> Drop for MutableInner<V> {
	fn drop(&mut self) {
		self.binding.dispose();
	}
}

/// A mutable value cell plus its change stream.
///
/// Backed by a serial send-slot identical in spirit to [`Signal`]'s own:
/// [`modify`](Self::modify) takes it, runs exactly once, and emits the new
/// value on `signal` only after releasing it.
pub struct MutableProperty<V> {
	inner: Arc<MutableInner<V>>,
}

impl<V> Clone for MutableProperty<V> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<V: 'static + Send + Clone> MutableProperty<V> {
	/// Builds a mutable property with the given initial value.
	pub fn new(value: V) -> Self {
		let (signal, observer, _interrupt) = signal::pipe::<V, Never>();
		Self {
			inner: Arc::new(MutableInner {
				value: Mutex::new(value),
				modify_owner: Mutex::new(None),
				observer,
				signal,
				binding: SerialDisposable::new(),
			}),
		}
	}

	/// The current value.
	pub fn value(&self) -> V {
		self.inner.value.lock().clone()
	}

	/// Replaces the value unconditionally; equivalent to `modify(|v| *v = value)`.
	pub fn set(&self, value: V) {
		// A plain set can't recurse, so the only way this fails is a bug in
		// `modify` itself.
		self.modify(move |slot| *slot = value)
			.expect("MutableProperty::set cannot recurse");
	}

	/// Takes the send-slot, runs `f` against the current value, writes
	/// whatever `f` left behind, releases the slot, then emits the new value
	/// on `signal`. Fails with [`RecursiveModifyError`] instead of
	/// deadlocking if `f` calls `modify` on this same property again.
	pub fn modify<R>(&self, f: impl FnOnce(&mut V) -> R) -> Result<R, RecursiveModifyError> {
		let this_thread = thread::current().id();
		if *self.inner.modify_owner.lock() == Some(this_thread) {
			return Err(RecursiveModifyError);
		}
		let mut guard = self.inner.value.lock();
		*self.inner.modify_owner.lock() = Some(this_thread);
		let result = f(&mut guard);
		let snapshot = guard.clone();
		drop(guard);
		*self.inner.modify_owner.lock() = None;
		self.inner.observer.send_value(snapshot);
		Ok(result)
	}

	/// The change stream: future values only, not the current one.
	pub fn signal(&self) -> &Signal<V, Never> {
		&self.inner.signal
	}

	/// A producer that, per run, synchronously emits the current value and
	/// then forwards every subsequent change.
	pub fn producer(&self) -> SignalProducer<V, Never> {
		let this = self.clone();
		SignalProducer::new(move |observer, _lifetime| {
			observer.send_value(this.value());
			this.signal().observe(observer)
		})
	}

	/// A read-only view over this property, sharing its value cell and signal.
	pub fn read_only(&self) -> Property<V> {
		let this = self.clone();
		let current = move || this.value();
		Property {
			inner: Arc::new(ReadOnlyInner {
				current: Box::new(current),
				signal: self.inner.signal.clone(),
				_subscription: None,
			}),
		}
	}

	/// Starts `source` and writes every value it emits into this property.
	/// Replaces (and disposes) any binding previously installed by an
	/// earlier `bind` call on the same property; the returned disposable
	/// tears down just this binding, and the last-installed binding is also
	/// torn down when the property itself is dropped.
	pub fn bind(&self, source: impl BindSource<V>) -> Arc<dyn Disposable> {
		let producer = source.into_producer();
		let this = self.clone();
		let disposable = producer.start_with_values(move |v| this.set(v));
		self.inner.binding.set(Arc::clone(&disposable));
		disposable
	}
}
