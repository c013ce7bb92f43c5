//! The cold, restartable recipe that materializes a fresh [`Signal`] per observer.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
	disposable::{CompositeDisposable, Disposable},
	event::Event,
	lifetime::Lifetime,
	observer::Observer,
	signal::{self, Signal},
};

type StartFn<V, E> = dyn Fn(Observer<V, E>, Lifetime) -> Option<Arc<dyn Disposable>> + Send + Sync;

/// A cold recipe for a [`Signal`]: holds no subscriptions of its own, and runs
/// its start-function fresh, independently, for every [`start`](Self::start)
/// call.
pub struct SignalProducer<V, E> {
	start_fn: Arc<StartFn<V, E>>,
}

impl<V, E> Clone for SignalProducer<V, E> {
	fn clone(&self) -> Self {
		Self {
			start_fn: Arc::clone(&self.start_fn),
		}
	}
}

/// Tracks the generator disposable returned by a start-function against
/// whether the run it belongs to has already produced a terminal event,
/// under one lock, so that whichever of "start-fn returned" and "a terminal
/// event arrived" happens second is the one that disposes it — exactly once,
/// regardless of which order a concurrent producer resolves them in.
enum GeneratorState {
	/// The start-function hasn't returned yet, and no terminal has arrived.
	Pending,
	/// A terminal arrived before the start-function returned, or before the
	/// disposable it returned could be disposed on arrival of a later one.
	Terminated,
	/// The start-function returned; `Some` until either disposed by a
	/// terminal event or consumed as "already terminated" right after return.
	Returned(Option<Arc<dyn Disposable>>),
}

/// Runs `start_fn` against a fresh pipe's driving observer, wiring up the
/// same "dispose the generator disposable exactly once, whenever the run's
/// first terminal event occurs" behavior [`Signal::new`] gives its own
/// generator — even though, unlike `Signal::new`, nothing here is built from
/// a generator closure running inside the signal's own constructor.
///
/// Crucially, `observer_into_signal` must already be attached to a live
/// observer (the real caller's, or whatever `start_with_signal`'s `setup`
/// wired up) by the time this runs: only then can values the start-function
/// sends synchronously, before it returns, actually reach anyone.
fn run_generator<V: 'static + Send + Clone, E: 'static + Send + Clone>(
	start_fn: Arc<StartFn<V, E>>,
	observer_into_signal: Observer<V, E>,
	lifetime: Lifetime,
	composite: &Arc<CompositeDisposable>,
) {
	let state = Arc::new(Mutex::new(GeneratorState::Pending));
	let wrapped_input = {
		let state = Arc::clone(&state);
		Observer::new(move |event: Event<V, E>| {
			let is_terminal = event.is_terminal();
			observer_into_signal.send(event);
			if is_terminal {
				let mut guard = state.lock();
				if let GeneratorState::Returned(generator_disposable) =
					std::mem::replace(&mut *guard, GeneratorState::Terminated)
				{
					drop(guard);
					if let Some(d) = generator_disposable {
						d.dispose();
					}
				}
			}
		})
	};

	let generator_disposable = start_fn(wrapped_input, lifetime);
	let mut guard = state.lock();
	match &*guard {
		GeneratorState::Terminated => {
			drop(guard);
			if let Some(d) = generator_disposable {
				d.dispose();
			}
		}
		GeneratorState::Pending => {
			*guard = GeneratorState::Returned(generator_disposable.clone());
			drop(guard);
			if let Some(d) = generator_disposable {
				composite.add(d);
			}
		}
		GeneratorState::Returned(_) => unreachable!("a start-function cannot return twice"),
	}
}

impl<V: 'static + Send + Clone, E: 'static + Send + Clone> SignalProducer<V, E> {
	/// Builds a producer from a start-function.
	///
	/// `start_fn` receives an observer feeding the signal it is about to
	/// materialize, plus the lifetime tied to this particular run; it returns
	/// the disposable that tears down whatever resources it allocated (a
	/// background thread, a subscription to some other producer, and so on),
	/// or `None` if there is nothing to tear down.
	pub fn new(
		start_fn: impl Fn(Observer<V, E>, Lifetime) -> Option<Arc<dyn Disposable>> + Send + Sync + 'static,
	) -> Self {
		Self {
			start_fn: Arc::new(start_fn),
		}
	}

	/// Allocates the fresh interrupting composite disposable `D`, the
	/// lifetime tied to it, and a manually-driven signal: shared groundwork
	/// for [`start`](Self::start) and
	/// [`start_with_signal`](Self::start_with_signal).
	fn new_run(&self) -> (Signal<V, E>, Observer<V, E>, Lifetime, Arc<CompositeDisposable>) {
		let composite = CompositeDisposable::new();
		let lifetime = Lifetime::from_disposable(Arc::clone(&composite));
		let (signal, observer_into_signal, _pipe_interrupt) = signal::pipe::<V, E>();
		(signal, observer_into_signal, lifetime, composite)
	}

	/// Materializes a fresh signal and observes it with `observer`. Returns the
	/// interrupting disposable `D`: disposing it tears down both the
	/// start-function's own resources and the subscription, per §4.8.
	///
	/// `observer` is attached to the fresh signal *before* the start-function
	/// runs, so that any event it sends synchronously is actually delivered
	/// rather than dispatched to an as-yet-empty observer registry.
	pub fn start(&self, observer: Observer<V, E>) -> Arc<dyn Disposable> {
		let (signal, observer_into_signal, lifetime, composite) = self.new_run();
		if let Some(subscription) = signal.observe(observer) {
			composite.add(subscription);
		}
		run_generator(Arc::clone(&self.start_fn), observer_into_signal, lifetime, &composite);
		composite
	}

	/// Materializes a fresh signal and hands it to `setup` before any observer
	/// is attached, so `setup` can multicast it to several observers sharing
	/// one underlying run instead of starting one run per observer.
	///
	/// `setup` must compose whatever it subscribes with the `Arc<dyn
	/// Disposable>` it receives (e.g. into its own [`CompositeDisposable`])
	/// and return that combined disposable, the same way the `lift`
	/// implementation below does: that disposable is this call's only handle
	/// on the start-function's own resources.
	pub fn start_with_signal<R>(
		&self,
		setup: impl FnOnce(&Signal<V, E>, Arc<dyn Disposable>) -> R,
	) -> R {
		let (signal, observer_into_signal, lifetime, composite) = self.new_run();
		let handle: Arc<dyn Disposable> = Arc::clone(&composite);
		let result = setup(&signal, handle);
		if composite.is_disposed() {
			// `setup` tore everything down before any observer stuck around;
			// no point running the start-function at all.
			return result;
		}
		run_generator(Arc::clone(&self.start_fn), observer_into_signal, lifetime, &composite);
		result
	}

	/// Starts this producer with a plain values-only callback.
	pub fn start_with_values(&self, f: impl FnMut(V) + Send + 'static) -> Arc<dyn Disposable>
	where
		E: Send,
	{
		let f = Mutex::new(f);
		self.start(Observer::new(move |event| {
			if let crate::event::Event::Value(v) = event {
				(&mut *f.lock())(v);
			}
		}))
	}

	/// Lifts a signal-level operator to the producer level: the produced
	/// signal of the resulting producer is the image of this producer's
	/// internal signal under `op`. The single mechanism every producer
	/// operator in this crate (other than the restart-dependent ones in
	/// `flourish-extra`) is built from.
	pub fn lift<V2: 'static + Send + Clone, E2: 'static + Send + Clone>(
		&self,
		op: impl Fn(&Signal<V, E>) -> Signal<V2, E2> + Send + Sync + 'static,
	) -> SignalProducer<V2, E2> {
		let this = self.clone();
		SignalProducer::new(move |observer, _lifetime| {
			let combined: Arc<dyn Disposable> = this.start_with_signal(|signal, inner_disposable| {
				let composite = CompositeDisposable::new();
				composite.add(inner_disposable);
				let lifted = op(signal);
				if let Some(subscription) = lifted.observe(observer) {
					composite.add(subscription);
				}
				let d: Arc<dyn Disposable> = composite;
				d
			});
			Some(combined)
		})
	}
}

impl<V: 'static + Send + Clone, E: 'static + Send + Clone> SignalProducer<V, E> {
	/// A producer that emits `value` then immediately completes, on every run.
	pub fn value(value: V) -> Self {
		SignalProducer::new(move |observer, _lifetime| {
			observer.send_value(value.clone());
			observer.send_completed();
			None
		})
	}

	/// A producer that emits `error` as its sole event, on every run.
	pub fn error(error: E) -> Self {
		SignalProducer::new(move |observer, _lifetime| {
			observer.send_failed(error.clone());
			None
		})
	}

	/// A producer that immediately completes without emitting any value.
	pub fn empty() -> Self {
		SignalProducer::new(|observer, _lifetime| {
			observer.send_completed();
			None
		})
	}

	/// A producer that never emits anything, ever (not even a terminal event).
	pub fn never() -> Self {
		SignalProducer::new(|_observer, _lifetime| None)
	}

	/// A producer that replays `values` in order, then completes, on every run.
	pub fn values(values: impl IntoIterator<Item = V>) -> Self {
		let values: Arc<Vec<V>> = Arc::new(values.into_iter().collect());
		SignalProducer::new(move |observer, _lifetime| {
			for value in values.iter() {
				observer.send_value(value.clone());
			}
			observer.send_completed();
			None
		})
	}
}
