//! Signal-level operators (§4.9): straightforward forward-with-transform
//! operators, plus the combinators that merge several signals into one.
//!
//! Every operator here follows the same shape: subscribe to the upstream
//! signal(s) from inside a fresh [`Signal::new`] generator, and let the new
//! signal's own at-most-one-terminal bookkeeping (and its automatic disposal
//! of the generator disposable on termination) take care of unsubscribing.
//! None of these operators need to manage termination/disposal races by hand.

use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
};

use parking_lot::Mutex;

use crate::{
	disposable::{CompositeDisposable, Disposable},
	event::Event,
	lifetime::Lifetime,
	observer::Observer,
	scheduler::Scheduler,
	signal::Signal,
};

impl<V: 'static + Send + Clone, E: 'static + Send + Clone> Signal<V, E> {
	/// Transforms every value; terminals pass through unchanged.
	pub fn map<V2: 'static + Send + Clone>(
		&self,
		f: impl Fn(V) -> V2 + Send + Sync + 'static,
	) -> Signal<V2, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			upstream.observe(Observer::new(move |event| {
				observer.send(event.map(&f));
			}))
		})
	}

	/// Forwards only values matching `p`; terminals pass through unchanged.
	pub fn filter(&self, p: impl Fn(&V) -> bool + Send + Sync + 'static) -> Signal<V, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			upstream.observe(Observer::new(move |event| {
				if let Event::Value(v) = &event {
					if !p(v) {
						return;
					}
				}
				observer.send(event);
			}))
		})
	}

	/// Transforms a failure; values and other terminals pass through unchanged.
	pub fn map_error<E2: 'static + Send + Clone>(
		&self,
		f: impl Fn(E) -> E2 + Send + Sync + 'static,
	) -> Signal<V, E2>
	where
		V: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			upstream.observe(Observer::new(move |event| {
				observer.send(event.map_error(&f));
			}))
		})
	}

	/// Turns every event into a value carrying that event, completing right
	/// after reporting a terminal. The resulting signal cannot itself fail.
	pub fn materialize(&self) -> Signal<Event<V, E>, crate::event::Never>
	where
		V: Send,
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			upstream.observe(Observer::new(move |event| {
				let was_terminal = event.is_terminal();
				observer.send_value(event);
				if was_terminal {
					observer.send_completed();
				}
			}))
		})
	}

	/// Forwards at most `n` values, then completes (even if the upstream signal
	/// has not itself terminated).
	pub fn take(&self, n: usize) -> Signal<V, E>
	where
		E: Send,
	{
		if n == 0 {
			return Signal::new(|observer| {
				observer.send_completed();
				None
			});
		}
		let upstream = self.clone();
		Signal::new(move |observer| {
			let remaining = Arc::new(Mutex::new(n));
			upstream.observe(Observer::new(move |event| {
				if let Event::Value(_) = &event {
					let mut remaining = remaining.lock();
					if *remaining == 0 {
						return;
					}
					*remaining -= 1;
					let exhausted = *remaining == 0;
					drop(remaining);
					observer.send(event);
					if exhausted {
						observer.send_completed();
					}
					return;
				}
				observer.send(event);
			}))
		})
	}

	/// Forwards values until `lifetime` ends, then completes.
	pub fn take_during(&self, lifetime: &Lifetime) -> Signal<V, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		let ended = lifetime.ended().clone();
		Signal::new(move |observer| {
			let composite = CompositeDisposable::new();
			if let Some(d) = upstream.observe(Observer::new({
				let observer = observer.clone();
				move |event| observer.send(event)
			})) {
				composite.add(d);
			}
			if let Some(d) = ended.observe_completed({
				let observer = observer.clone();
				move || observer.send_completed()
			}) {
				composite.add(d);
			}
			let disposable: Arc<dyn Disposable> = composite;
			Some(disposable)
		})
	}

	/// Drops the first `n` values; terminals pass through unchanged.
	pub fn skip(&self, n: usize) -> Signal<V, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			let remaining = Arc::new(AtomicU64::new(n as u64));
			upstream.observe(Observer::new(move |event| {
				if matches!(event, Event::Value(_))
					&& remaining
						.fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
							if r > 0 {
								Some(r - 1)
							} else {
								None
							}
						})
						.is_ok()
				{
					return;
				}
				observer.send(event);
			}))
		})
	}

	/// Drops consecutive values `eq` considers equal to the one forwarded
	/// immediately before.
	pub fn skip_repeats(
		&self,
		eq: impl Fn(&V, &V) -> bool + Send + Sync + 'static,
	) -> Signal<V, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			let last: Arc<Mutex<Option<V>>> = Arc::new(Mutex::new(None));
			upstream.observe(Observer::new(move |event| {
				if let Event::Value(v) = &event {
					let mut last = last.lock();
					if let Some(previous) = last.as_ref() {
						if eq(previous, v) {
							return;
						}
					}
					*last = Some(v.clone());
				}
				observer.send(event);
			}))
		})
	}

	/// Re-dispatches every event through `scheduler`, preserving order (the
	/// scheduler is serial). Disposing the result cancels any not-yet-run
	/// re-dispatched event, same as disposing a plain `Scheduler::schedule`.
	pub fn observe_on(&self, scheduler: Scheduler) -> Signal<V, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			let composite = CompositeDisposable::new();
			let scheduler = scheduler.clone();
			if let Some(d) = upstream.observe(Observer::new({
				let observer = observer.clone();
				let composite = Arc::clone(&composite);
				move |event| {
					let observer = observer.clone();
					match scheduler.schedule(move || observer.send(event)) {
						Ok(job) => composite.add(job),
						Err(error) => log::debug!(
							target: "flourish::operators",
							"observe(on:) dropped an event: {error}"
						),
					}
				}
			})) {
				composite.add(d);
			}
			let disposable: Arc<dyn Disposable> = composite;
			Some(disposable)
		})
	}

	/// Runs a fallible closure per value, turning an `Err` into `Failed` and
	/// terminating the stream there (per §7: "user callbacks that throw must
	/// be caught at the operator boundary and surfaced as `failed`").
	pub fn attempt(&self, f: impl Fn(&V) -> Result<(), E> + Send + Sync + 'static) -> Signal<V, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			upstream.observe(Observer::new(move |event| match event {
				Event::Value(v) => match f(&v) {
					Ok(()) => observer.send_value(v),
					Err(e) => observer.send_failed(e),
				},
				other => observer.send(other),
			}))
		})
	}

	/// Like [`attempt`](Self::attempt), but the closure also transforms the value.
	pub fn attempt_map<V2: 'static + Send + Clone>(
		&self,
		f: impl Fn(V) -> Result<V2, E> + Send + Sync + 'static,
	) -> Signal<V2, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			upstream.observe(Observer::new(move |event| match event {
				Event::Value(v) => match f(v) {
					Ok(v2) => observer.send_value(v2),
					Err(e) => observer.send_failed(e),
				},
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => observer.send_completed(),
				Event::Interrupted => observer.send_interrupted(),
			}))
		})
	}

	/// Local recovery for the failure domain: `Failed(e)` is replaced by
	/// whatever signal `f(e)` produces instead of propagating. The dual of
	/// `map_error` for the `failed` terminal, named in §7 but not §4.9.
	pub fn flat_map_error<E2: 'static + Send + Clone>(
		&self,
		f: impl Fn(E) -> Signal<V, E2> + Send + Sync + 'static,
	) -> Signal<V, E2>
	where
		V: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			let composite = CompositeDisposable::new();
			if let Some(d) = upstream.observe(Observer::new({
				let observer = observer.clone();
				let composite = Arc::clone(&composite);
				move |event| match event {
					Event::Value(v) => observer.send_value(v),
					Event::Failed(e) => {
						let replacement = f(e);
						if let Some(d) = replacement.observe(observer.clone()) {
							composite.add(d);
						}
					}
					Event::Completed => observer.send_completed(),
					Event::Interrupted => observer.send_interrupted(),
				}
			})) {
				composite.add(d);
			}
			let disposable: Arc<dyn Disposable> = composite;
			Some(disposable)
		})
	}

	/// Buffers every value, emitting them as one `Vec` right before completing.
	pub fn collect(&self) -> Signal<Vec<V>, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			let buffer: Arc<Mutex<Vec<V>>> = Arc::new(Mutex::new(Vec::new()));
			upstream.observe(Observer::new(move |event| match event {
				Event::Value(v) => buffer.lock().push(v),
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => {
					let values = std::mem::take(&mut *buffer.lock());
					observer.send_value(values);
					observer.send_completed();
				}
				Event::Interrupted => observer.send_interrupted(),
			}))
		})
	}

	/// Folds every value into a running accumulator, emitting the final
	/// accumulator once, right before completing.
	pub fn reduce<Acc: 'static + Send + Clone>(
		&self,
		initial: Acc,
		f: impl Fn(Acc, V) -> Acc + Send + Sync + 'static,
	) -> Signal<Acc, E>
	where
		E: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			let acc: Arc<Mutex<Option<Acc>>> = Arc::new(Mutex::new(Some(initial)));
			upstream.observe(Observer::new(move |event| match event {
				Event::Value(v) => {
					let mut guard = acc.lock();
					let current = guard.take().expect("reduce accumulator missing mid-stream");
					*guard = Some(f(current, v));
				}
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => {
					let final_value = acc
						.lock()
						.take()
						.expect("reduce accumulator missing at completion");
					observer.send_value(final_value);
					observer.send_completed();
				}
				Event::Interrupted => observer.send_interrupted(),
			}))
		})
	}
}

impl<V: 'static + Send + Clone, E: 'static + Send + Clone> Signal<V, E>
where
	V: PartialEq,
{
	/// `skip_repeats` using `PartialEq` as the equality test.
	pub fn skip_repeats_eq(&self) -> Signal<V, E>
	where
		E: Send,
	{
		self.skip_repeats(|a, b| a == b)
	}
}

impl<V: 'static + Send + Clone, E: 'static + Send + Clone, E2: 'static + Send + Clone>
	Signal<Event<V, E>, E2>
{
	/// Inverts [`Signal::materialize`]: unwraps each carried event back onto
	/// its own track. The carrier signal's own terminal (always `Completed` for
	/// anything produced by `materialize`) is dropped rather than forwarded.
	pub fn dematerialize(&self) -> Signal<V, E>
	where
		E2: Send,
	{
		let upstream = self.clone();
		Signal::new(move |observer| {
			upstream.observe(Observer::new(move |event| {
				if let Event::Value(inner) = event {
					observer.send(inner);
				}
			}))
		})
	}
}

struct ZipState<VA, VB> {
	a: VecDeque<VA>,
	b: VecDeque<VB>,
	a_completed: bool,
	b_completed: bool,
}

fn drain_zip<VA: Clone, VB: Clone, E>(
	state: &mut ZipState<VA, VB>,
	observer: &Observer<(VA, VB), E>,
) {
	while let (Some(_), Some(_)) = (state.a.front(), state.b.front()) {
		let a = state.a.pop_front().unwrap();
		let b = state.b.pop_front().unwrap();
		observer.send_value((a, b));
	}
	if (state.a_completed && state.a.is_empty()) || (state.b_completed && state.b.is_empty()) {
		observer.send_completed();
	}
}

/// Buffers per side, emitting paired `(av, bv)` values in arrival-order pairs.
/// Completes as soon as either side has completed and its buffer is drained;
/// fails on the first failure, interrupts on the first interrupt, from either
/// side.
pub fn zip<VA, VB, E>(a: &Signal<VA, E>, b: &Signal<VB, E>) -> Signal<(VA, VB), E>
where
	VA: 'static + Send + Clone,
	VB: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let a = a.clone();
	let b = b.clone();
	Signal::new(move |observer| {
		let composite = CompositeDisposable::new();
		let state = Arc::new(Mutex::new(ZipState {
			a: VecDeque::new(),
			b: VecDeque::new(),
			a_completed: false,
			b_completed: false,
		}));

		if let Some(d) = a.observe(Observer::new({
			let observer = observer.clone();
			let state = Arc::clone(&state);
			move |event| match event {
				Event::Value(v) => {
					let mut guard = state.lock();
					guard.a.push_back(v);
					drain_zip(&mut guard, &observer);
				}
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => {
					let mut guard = state.lock();
					guard.a_completed = true;
					drain_zip(&mut guard, &observer);
				}
				Event::Interrupted => observer.send_interrupted(),
			}
		})) {
			composite.add(d);
		}

		if let Some(d) = b.observe(Observer::new({
			let observer = observer.clone();
			let state = Arc::clone(&state);
			move |event| match event {
				Event::Value(v) => {
					let mut guard = state.lock();
					guard.b.push_back(v);
					drain_zip(&mut guard, &observer);
				}
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => {
					let mut guard = state.lock();
					guard.b_completed = true;
					drain_zip(&mut guard, &observer);
				}
				Event::Interrupted => observer.send_interrupted(),
			}
		})) {
			composite.add(d);
		}

		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}

struct CombineLatestState<VA, VB> {
	a: Option<VA>,
	b: Option<VB>,
}

/// Emits `(latestA, latestB)` once both sides have emitted at least one
/// value, then again on every later change from either side. Terminal rules
/// as [`zip`].
pub fn combine_latest<VA, VB, E>(a: &Signal<VA, E>, b: &Signal<VB, E>) -> Signal<(VA, VB), E>
where
	VA: 'static + Send + Clone,
	VB: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let a = a.clone();
	let b = b.clone();
	Signal::new(move |observer| {
		let composite = CompositeDisposable::new();
		let state = Arc::new(Mutex::new(CombineLatestState { a: None, b: None }));

		if let Some(d) = a.observe(Observer::new({
			let observer = observer.clone();
			let state = Arc::clone(&state);
			move |event| match event {
				Event::Value(v) => {
					let mut guard = state.lock();
					guard.a = Some(v);
					if let (Some(av), Some(bv)) = (guard.a.clone(), guard.b.clone()) {
						drop(guard);
						observer.send_value((av, bv));
					}
				}
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => observer.send_completed(),
				Event::Interrupted => observer.send_interrupted(),
			}
		})) {
			composite.add(d);
		}

		if let Some(d) = b.observe(Observer::new({
			let observer = observer.clone();
			let state = Arc::clone(&state);
			move |event| match event {
				Event::Value(v) => {
					let mut guard = state.lock();
					guard.b = Some(v);
					if let (Some(av), Some(bv)) = (guard.a.clone(), guard.b.clone()) {
						drop(guard);
						observer.send_value((av, bv));
					}
				}
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => observer.send_completed(),
				Event::Interrupted => observer.send_interrupted(),
			}
		})) {
			composite.add(d);
		}

		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}

/// Forwards every value from every source in arrival order; completes only
/// once every source has completed; the first failure or interrupt from any
/// source terminates the merge.
pub fn merge<V, E>(sources: impl IntoIterator<Item = Signal<V, E>>) -> Signal<V, E>
where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let sources: Vec<Signal<V, E>> = sources.into_iter().collect();
	Signal::new(move |observer| {
		if sources.is_empty() {
			observer.send_completed();
			return None;
		}
		let composite = CompositeDisposable::new();
		let remaining = Arc::new(AtomicU64::new(sources.len() as u64));
		for source in sources {
			let observer = observer.clone();
			let remaining = Arc::clone(&remaining);
			if let Some(d) = source.observe(Observer::new(move |event| match event {
				Event::Value(v) => observer.send_value(v),
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => {
					if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
						observer.send_completed();
					}
				}
				Event::Interrupted => observer.send_interrupted(),
			})) {
				composite.add(d);
			}
		}
		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}
