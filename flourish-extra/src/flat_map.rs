//! `flatMap` at the producer level, in each of its standard strategies. This
//! cannot be expressed as a `Signal`-level combinator: switching strategy
//! needs to *start* a fresh inner run per outer value, something only a
//! [`SignalProducer`] (not an already-running `Signal`) can do.

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc,
	},
};

use parking_lot::Mutex;

use flourish::{CompositeDisposable, Disposable, Event, Observer, SerialDisposable, SignalProducer};

/// How a `flatMap` over producers picks which inner run(s) to forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatMapStrategy {
	/// Run every inner producer to completion, one at a time, in the order
	/// their outer values arrived.
	Concat,
	/// Run every inner producer concurrently, interleaving their values as
	/// they arrive.
	Merge,
	/// Run only the most recently started inner producer; starting a new one
	/// disposes whichever was previously running.
	Latest,
	/// Run every inner producer that arrives before a winner is decided;
	/// the first to emit a value wins, and every other contender (past or
	/// future) is disposed without being forwarded.
	Race,
}

/// Flattens `outer`'s inner producers into one producer, per `strategy`.
pub fn flat_map<V, V2, E>(
	outer: &SignalProducer<V, E>,
	strategy: FlatMapStrategy,
	f: impl Fn(V) -> SignalProducer<V2, E> + Send + Sync + 'static,
) -> SignalProducer<V2, E>
where
	V: 'static + Send + Clone,
	V2: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let outer = outer.clone();
	let f: Arc<dyn Fn(V) -> SignalProducer<V2, E> + Send + Sync> = Arc::new(f);
	SignalProducer::new(move |observer, _lifetime| match strategy {
		FlatMapStrategy::Latest => flat_map_latest(&outer, Arc::clone(&f), observer),
		FlatMapStrategy::Concat => flat_map_concat(&outer, Arc::clone(&f), observer),
		FlatMapStrategy::Merge => flat_map_merge(&outer, Arc::clone(&f), observer),
		FlatMapStrategy::Race => flat_map_race(&outer, Arc::clone(&f), observer),
	})
}

fn flat_map_latest<V, V2, E>(
	outer: &SignalProducer<V, E>,
	f: Arc<dyn Fn(V) -> SignalProducer<V2, E> + Send + Sync>,
	observer: Observer<V2, E>,
) -> Option<Arc<dyn Disposable>>
where
	V: 'static + Send + Clone,
	V2: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let composite = CompositeDisposable::new();
	let current = SerialDisposable::new();
	composite.add(Arc::clone(&current) as Arc<dyn Disposable>);
	let outer_done = Arc::new(AtomicBool::new(false));
	let inner_done = Arc::new(AtomicBool::new(true));

	let outer_observer = Observer::new({
		let observer = observer.clone();
		let current = Arc::clone(&current);
		let outer_done = Arc::clone(&outer_done);
		let inner_done = Arc::clone(&inner_done);
		move |event| match event {
			Event::Value(v) => {
				inner_done.store(false, Ordering::Release);
				let inner_producer = f(v);
				let observer = observer.clone();
				let outer_done = Arc::clone(&outer_done);
				let inner_done = Arc::clone(&inner_done);
				let d = inner_producer.start(Observer::new(move |event| match event {
					Event::Value(v2) => observer.send_value(v2),
					Event::Failed(e) => observer.send_failed(e),
					// A replaced inner's `Interrupted` (from being disposed by the
					// next value arriving) is swallowed, not forwarded: only the
					// current inner's own termination matters downstream.
					Event::Interrupted => {}
					Event::Completed => {
						inner_done.store(true, Ordering::Release);
						if outer_done.load(Ordering::Acquire) {
							observer.send_completed();
						}
					}
				}));
				current.set(d);
			}
			Event::Failed(e) => observer.send_failed(e),
			Event::Completed => {
				outer_done.store(true, Ordering::Release);
				if inner_done.load(Ordering::Acquire) {
					observer.send_completed();
				}
			}
			Event::Interrupted => observer.send_interrupted(),
		}
	});
	let outer_sub = outer.start(outer_observer);
	composite.add(outer_sub);
	let disposable: Arc<dyn Disposable> = composite;
	Some(disposable)
}

struct ConcatState<V2, E> {
	queue: std::collections::VecDeque<SignalProducer<V2, E>>,
	running: bool,
	outer_done: bool,
}

fn flat_map_concat<V, V2, E>(
	outer: &SignalProducer<V, E>,
	f: Arc<dyn Fn(V) -> SignalProducer<V2, E> + Send + Sync>,
	observer: Observer<V2, E>,
) -> Option<Arc<dyn Disposable>>
where
	V: 'static + Send + Clone,
	V2: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let composite = CompositeDisposable::new();
	let current = SerialDisposable::new();
	composite.add(Arc::clone(&current) as Arc<dyn Disposable>);
	let state = Arc::new(Mutex::new(ConcatState {
		queue: std::collections::VecDeque::new(),
		running: false,
		outer_done: false,
	}));

	let outer_observer = Observer::new({
		let state = Arc::clone(&state);
		let observer = observer.clone();
		let current = Arc::clone(&current);
		move |event| match event {
			Event::Value(v) => {
				state.lock().queue.push_back(f(v));
				concat_start_next(&state, &observer, &current);
			}
			Event::Failed(e) => observer.send_failed(e),
			Event::Completed => {
				let mut guard = state.lock();
				guard.outer_done = true;
				let should_complete = !guard.running && guard.queue.is_empty();
				drop(guard);
				if should_complete {
					observer.send_completed();
				}
			}
			Event::Interrupted => observer.send_interrupted(),
		}
	});
	let outer_sub = outer.start(outer_observer);
	composite.add(outer_sub);
	let disposable: Arc<dyn Disposable> = composite;
	Some(disposable)
}

fn concat_start_next<V2: 'static + Send + Clone, E: 'static + Send + Clone>(
	state: &Arc<Mutex<ConcatState<V2, E>>>,
	observer: &Observer<V2, E>,
	current: &Arc<SerialDisposable>,
) {
	let next = {
		let mut guard = state.lock();
		if guard.running {
			return;
		}
		match guard.queue.pop_front() {
			Some(p) => {
				guard.running = true;
				Some(p)
			}
			None => {
				let done = guard.outer_done;
				drop(guard);
				if done {
					observer.send_completed();
				}
				None
			}
		}
	};
	let Some(producer) = next else { return };
	let observer2 = observer.clone();
	let state2 = Arc::clone(state);
	let current2 = Arc::clone(current);
	let d = producer.start(Observer::new(move |event| match event {
		Event::Value(v) => observer2.send_value(v),
		Event::Failed(e) => observer2.send_failed(e),
		Event::Interrupted => observer2.send_interrupted(),
		Event::Completed => {
			state2.lock().running = false;
			concat_start_next(&state2, &observer2, &current2);
		}
	}));
	current.set(d);
}

fn flat_map_merge<V, V2, E>(
	outer: &SignalProducer<V, E>,
	f: Arc<dyn Fn(V) -> SignalProducer<V2, E> + Send + Sync>,
	observer: Observer<V2, E>,
) -> Option<Arc<dyn Disposable>>
where
	V: 'static + Send + Clone,
	V2: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let composite = CompositeDisposable::new();
	// Counts `outer` itself as one more pending source, alongside every inner
	// run currently in flight; completing only once this reaches zero is what
	// makes "outer done AND every inner done" converge regardless of order.
	let remaining = Arc::new(AtomicU64::new(1));

	let outer_observer = Observer::new({
		let observer = observer.clone();
		let composite = Arc::clone(&composite);
		let remaining = Arc::clone(&remaining);
		move |event| match event {
			Event::Value(v) => {
				remaining.fetch_add(1, Ordering::AcqRel);
				let inner = f(v);
				let observer = observer.clone();
				let remaining = Arc::clone(&remaining);
				let d = inner.start(Observer::new(move |event| match event {
					Event::Value(v2) => observer.send_value(v2),
					Event::Failed(e) => observer.send_failed(e),
					Event::Interrupted => observer.send_interrupted(),
					Event::Completed => {
						if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
							observer.send_completed();
						}
					}
				}));
				composite.add(d);
			}
			Event::Failed(e) => observer.send_failed(e),
			Event::Completed => {
				if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
					observer.send_completed();
				}
			}
			Event::Interrupted => observer.send_interrupted(),
		}
	});
	let outer_sub = outer.start(outer_observer);
	composite.add(outer_sub);
	let disposable: Arc<dyn Disposable> = composite;
	Some(disposable)
}

fn flat_map_race<V, V2, E>(
	outer: &SignalProducer<V, E>,
	f: Arc<dyn Fn(V) -> SignalProducer<V2, E> + Send + Sync>,
	observer: Observer<V2, E>,
) -> Option<Arc<dyn Disposable>>
where
	V: 'static + Send + Clone,
	V2: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let composite = CompositeDisposable::new();
	let contenders: Arc<Mutex<HashMap<u64, Arc<dyn Disposable>>>> = Arc::new(Mutex::new(HashMap::new()));
	let next_id = Arc::new(AtomicU64::new(0));
	let winner: Arc<Mutex<Option<u64>>> = Arc::new(Mutex::new(None));

	let outer_observer = Observer::new({
		let observer = observer.clone();
		let composite = Arc::clone(&composite);
		let contenders = Arc::clone(&contenders);
		let next_id = Arc::clone(&next_id);
		let winner = Arc::clone(&winner);
		move |event| match event {
			Event::Value(v) => {
				if winner.lock().is_some() {
					return;
				}
				let id = next_id.fetch_add(1, Ordering::AcqRel);
				let inner = f(v);
				let observer = observer.clone();
				let contenders2 = Arc::clone(&contenders);
				let winner2 = Arc::clone(&winner);
				let d = inner.start(Observer::new(move |event| {
					let just_won = {
						let mut guard = winner2.lock();
						match *guard {
							Some(_) => false,
							None if matches!(event, Event::Value(_)) => {
								*guard = Some(id);
								true
							}
							None => false,
						}
					};
					let is_winner = *winner2.lock() == Some(id);
					if !is_winner {
						return;
					}
					observer.send(event);
					if just_won {
						for (loser_id, loser) in contenders2.lock().iter() {
							if *loser_id != id {
								loser.dispose();
							}
						}
					}
				}));
				composite.add(Arc::clone(&d));
				contenders.lock().insert(id, d);
			}
			Event::Failed(e) => observer.send_failed(e),
			// Outer completing doesn't by itself end the race: it just stops
			// admitting new contenders. The race ends when a winner finishes.
			Event::Completed => {}
			Event::Interrupted => observer.send_interrupted(),
		}
	});
	let outer_sub = outer.start(outer_observer);
	composite.add(outer_sub);
	let disposable: Arc<dyn Disposable> = composite;
	Some(disposable)
}
