//! Operators that restart a producer's underlying recipe: `times`, `retry`,
//! `then`, and the restart-sharing `replayLazily`.

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	},
};

use parking_lot::Mutex;

use flourish::{CompositeDisposable, Disposable, Event, Observer, SerialDisposable, SignalProducer};

/// Runs `producer` from scratch `n` times in a row, concatenating their
/// output; completes once the `n`th run completes. `n == 0` completes
/// immediately without ever starting `producer`.
pub fn times<V, E>(producer: &SignalProducer<V, E>, n: usize) -> SignalProducer<V, E>
where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	if n == 0 {
		return SignalProducer::empty();
	}
	let producer = producer.clone();
	SignalProducer::new(move |observer, _lifetime| {
		let composite = CompositeDisposable::new();
		let current = SerialDisposable::new();
		composite.add(Arc::clone(&current) as Arc<dyn Disposable>);
		let remaining = Arc::new(AtomicUsize::new(n));
		times_run_next(&producer, &remaining, &observer, &current);
		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}

fn times_run_next<V: 'static + Send + Clone, E: 'static + Send + Clone>(
	producer: &SignalProducer<V, E>,
	remaining: &Arc<AtomicUsize>,
	observer: &Observer<V, E>,
	current: &Arc<SerialDisposable>,
) {
	let producer2 = producer.clone();
	let remaining2 = Arc::clone(remaining);
	let observer2 = observer.clone();
	let current2 = Arc::clone(current);
	let d = producer.start(Observer::new(move |event| match event {
		Event::Value(v) => observer2.send_value(v),
		Event::Failed(e) => observer2.send_failed(e),
		Event::Interrupted => observer2.send_interrupted(),
		Event::Completed => {
			if remaining2.fetch_sub(1, Ordering::AcqRel) == 1 {
				observer2.send_completed();
			} else {
				times_run_next(&producer2, &remaining2, &observer2, &current2);
			}
		}
	}));
	current.set(d);
}

/// Runs `producer`, and on `Failed`, restarts it from scratch up to `n`
/// additional times before giving up and propagating the last failure.
/// `Completed`/`Interrupted` pass straight through without a retry.
pub fn retry<V, E>(producer: &SignalProducer<V, E>, n: usize) -> SignalProducer<V, E>
where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let producer = producer.clone();
	SignalProducer::new(move |observer, _lifetime| {
		let composite = CompositeDisposable::new();
		let current = SerialDisposable::new();
		composite.add(Arc::clone(&current) as Arc<dyn Disposable>);
		let remaining = Arc::new(AtomicUsize::new(n));
		retry_attempt(&producer, &remaining, &observer, &current);
		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}

fn retry_attempt<V: 'static + Send + Clone, E: 'static + Send + Clone>(
	producer: &SignalProducer<V, E>,
	remaining: &Arc<AtomicUsize>,
	observer: &Observer<V, E>,
	current: &Arc<SerialDisposable>,
) {
	let producer2 = producer.clone();
	let remaining2 = Arc::clone(remaining);
	let observer2 = observer.clone();
	let current2 = Arc::clone(current);
	let d = producer.start(Observer::new(move |event| match event {
		Event::Value(v) => observer2.send_value(v),
		Event::Completed => observer2.send_completed(),
		Event::Interrupted => observer2.send_interrupted(),
		Event::Failed(e) => {
			let retried = remaining2
				.fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| {
					if r > 0 {
						Some(r - 1)
					} else {
						None
					}
				})
				.is_ok();
			if retried {
				retry_attempt(&producer2, &remaining2, &observer2, &current2);
			} else {
				observer2.send_failed(e);
			}
		}
	}));
	current.set(d);
}

/// Runs `producer`, discarding its values; once it completes, starts `next`
/// and forwards its events instead. A failure or interruption from `producer`
/// propagates immediately, without ever starting `next`.
pub fn then<V, V2, E>(producer: &SignalProducer<V, E>, next: &SignalProducer<V2, E>) -> SignalProducer<V2, E>
where
	V: 'static + Send + Clone,
	V2: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let producer = producer.clone();
	let next = next.clone();
	SignalProducer::new(move |observer, _lifetime| {
		let composite = CompositeDisposable::new();
		let current = SerialDisposable::new();
		composite.add(Arc::clone(&current) as Arc<dyn Disposable>);

		let next = next.clone();
		let observer_for_first = observer.clone();
		let current_for_first = Arc::clone(&current);
		let first = producer.start(Observer::new(move |event: Event<V, E>| match event {
			Event::Value(_) => {}
			Event::Failed(e) => observer_for_first.send_failed(e),
			Event::Interrupted => observer_for_first.send_interrupted(),
			Event::Completed => {
				let d = next.start(observer_for_first.clone());
				current_for_first.set(d);
			}
		}));
		current.set(first);

		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}

enum ReplayState<V, E> {
	Active {
		buffer: VecDeque<V>,
		observers: HashMap<u64, Observer<V, E>>,
		next_id: u64,
	},
	Terminated {
		buffer: VecDeque<V>,
		terminal: Event<V, E>,
	},
}

struct ReplayInner<V, E> {
	cap: usize,
	state: Mutex<ReplayState<V, E>>,
	/// The disposable for the one lazily-started shared run, set once by
	/// whichever call to the produced producer's start-function happens to be
	/// first. Torn down once the subscriber count drops back to zero while
	/// still `Active`, so an unbounded/long-running shared producer doesn't
	/// keep running forever after everyone has walked away.
	shared_run: Mutex<Option<Arc<dyn Disposable>>>,
}

fn replay_dispatch<V: Clone, E: Clone>(inner: &Arc<ReplayInner<V, E>>, event: Event<V, E>) {
	let mut guard = inner.state.lock();
	let ReplayState::Active {
		buffer, observers, ..
	} = &mut *guard
	else {
		return;
	};
	if let Event::Value(v) = &event {
		buffer.push_back(v.clone());
		if buffer.len() > inner.cap {
			buffer.pop_front();
		}
	}
	if event.is_terminal() {
		let buffer = std::mem::take(buffer);
		let observers = std::mem::take(observers);
		*guard = ReplayState::Terminated {
			buffer,
			terminal: event.clone(),
		};
		drop(guard);
		for observer in observers.into_values() {
			observer.send(event.clone());
		}
	} else {
		let observers: Vec<_> = observers.values().cloned().collect();
		drop(guard);
		for observer in observers {
			observer.send(event.clone());
		}
	}
}

fn replay_subscribe<V: Clone, E: Clone>(
	inner: &Arc<ReplayInner<V, E>>,
	observer: Observer<V, E>,
) -> Option<Arc<dyn Disposable>> {
	let mut guard = inner.state.lock();
	match &mut *guard {
		ReplayState::Active {
			buffer,
			observers,
			next_id,
		} => {
			for v in buffer.iter() {
				observer.send_value(v.clone());
			}
			let id = *next_id;
			*next_id += 1;
			observers.insert(id, observer);
			drop(guard);
			let inner = Arc::clone(inner);
			Some(flourish::ActionDisposable::new(move || {
				let became_empty = {
					let mut guard = inner.state.lock();
					if let ReplayState::Active { observers, .. } = &mut *guard {
						observers.remove(&id);
						observers.is_empty()
					} else {
						false
					}
				};
				if became_empty {
					// Last subscriber gone while the shared run is still in
					// flight: tear it down instead of leaving it running for
					// an audience that no longer exists.
					if let Some(run) = inner.shared_run.lock().take() {
						run.dispose();
					}
				}
			}))
		}
		ReplayState::Terminated { buffer, terminal } => {
			let buffer = buffer.clone();
			let terminal = terminal.clone();
			drop(guard);
			for v in buffer {
				observer.send_value(v);
			}
			observer.send(terminal);
			None
		}
	}
}

/// Shares one underlying run of `producer` across every subscriber, replaying
/// the last `n` values to whoever joins late. The run itself starts lazily,
/// on the first subscriber, and is never restarted for later ones — this
/// deliberately does not give a late joiner a resumed, live view of a run
/// already finished: if the shared run has already terminated, a late
/// subscriber gets the buffered replay followed by that same terminal event,
/// never a fresh run. If every subscriber disposes before the shared run
/// terminates, the run itself is disposed too, instead of being left running
/// for an audience that no longer exists.
pub fn replay_lazily<V, E>(producer: &SignalProducer<V, E>, n: usize) -> SignalProducer<V, E>
where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let producer = producer.clone();
	let inner: Arc<ReplayInner<V, E>> = Arc::new(ReplayInner {
		cap: n,
		state: Mutex::new(ReplayState::Active {
			buffer: VecDeque::new(),
			observers: HashMap::new(),
			next_id: 0,
		}),
		shared_run: Mutex::new(None),
	});
	let started = Arc::new(std::sync::atomic::AtomicBool::new(false));
	SignalProducer::new(move |observer, _lifetime| {
		if !started.swap(true, Ordering::AcqRel) {
			let inner2 = Arc::clone(&inner);
			let d = producer.start(Observer::new(move |event| replay_dispatch(&inner2, event)));
			*inner.shared_run.lock() = Some(d);
		}
		replay_subscribe(&inner, observer)
	})
}
