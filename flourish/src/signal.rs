//! The hot, multicast, push-based event stream at the center of this crate.

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc,
	},
};

use parking_lot::Mutex;

use crate::{
	disposable::{ActionDisposable, Disposable},
	event::Event,
	observer::Observer,
};

enum State<V, E> {
	Alive {
		observers: HashMap<u64, Observer<V, E>>,
		next_id: u64,
		generator_disposable: Option<Arc<dyn Disposable>>,
	},
	Terminated,
}

struct Inner<V, E> {
	state: Mutex<State<V, E>>,
	/// `true` while some thread is draining `pending`; used to trampoline
	/// sends that arrive while an earlier send on this signal is still being
	/// delivered (including re-entrant sends from inside an observer's own
	/// handler), so that the observable effect is always strict total order.
	draining: AtomicBool,
	pending: Mutex<VecDeque<Event<V, E>>>,
}

/// A hot, multicast, push-based event stream with single-terminal lifecycle.
///
/// Cloning a `Signal` clones the handle, not the stream: every clone observes
/// the same underlying events. A `Signal` is kept alive by any outstanding
/// subscription and by the generator's own retained handle to its internal
/// observer; once both drop away with no terminal event having occurred, the
/// signal is simply collected — no event is synthesized for an audience that
/// no longer exists.
///
/// Multicasting requires `V` and `E` to be [`Clone`]: the same event is handed
/// to every registered observer, so it must be duplicable rather than moved
/// into just one of them.
pub struct Signal<V, E> {
	inner: Arc<Inner<V, E>>,
}

impl<V, E> Clone for Signal<V, E> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<V: 'static + Send + Clone, E: 'static + Send + Clone> Signal<V, E> {
	/// Constructs a signal from a generator.
	///
	/// The generator is invoked synchronously, with an observer that feeds
	/// this signal's internal send slot. Its return value, if any, is the
	/// *generator disposable*: disposed exactly once, either when the signal
	/// terminates or when whatever holds the generator decides to interrupt it.
	pub fn new(
		generator: impl FnOnce(Observer<V, E>) -> Option<Arc<dyn Disposable>>,
	) -> Self {
		let inner = Arc::new(Inner {
			state: Mutex::new(State::Alive {
				observers: HashMap::new(),
				next_id: 0,
				generator_disposable: None,
			}),
			draining: AtomicBool::new(false),
			pending: Mutex::new(VecDeque::new()),
		});

		let internal_observer = {
			let inner = Arc::clone(&inner);
			Observer::new(move |event| internal_send(&inner, event))
		};

		let generator_disposable = generator(internal_observer);

		let mut state = inner.state.lock();
		match &mut *state {
			State::Alive {
				generator_disposable: slot,
				..
			} => *slot = generator_disposable,
			State::Terminated => {
				// The generator already pushed a terminal event synchronously
				// before returning; its disposable has no signal left to belong
				// to, dispose it immediately rather than leaking it.
				drop(state);
				if let Some(d) = generator_disposable {
					d.dispose();
				}
				return Self { inner };
			}
		}
		drop(state);
		Self { inner }
	}

	/// Registers `observer`. Returns a disposable that removes just this
	/// observer when disposed, or `None` if the signal had already terminated
	/// — in which case `observer` was synchronously sent exactly `Interrupted`
	/// and there is nothing left to unregister.
	pub fn observe(&self, observer: Observer<V, E>) -> Option<Arc<dyn Disposable>> {
		let mut state = self.inner.state.lock();
		match &mut *state {
			State::Alive {
				observers,
				next_id, ..
			} => {
				let id = *next_id;
				*next_id += 1;
				observers.insert(id, observer);
				drop(state);
				let inner = Arc::clone(&self.inner);
				Some(ActionDisposable::new(move || {
					if let State::Alive { observers, .. } = &mut *inner.state.lock() {
						observers.remove(&id);
					}
				}))
			}
			State::Terminated => {
				drop(state);
				observer.send_interrupted();
				None
			}
		}
	}

	/// Observes only `Value` events.
	pub fn observe_values(
		&self,
		f: impl FnMut(V) + Send + 'static,
	) -> Option<Arc<dyn Disposable>>
	where
		E: Send,
	{
		let f = Mutex::new(f);
		self.observe(Observer::new(move |event| {
			if let Event::Value(v) = event {
				(&mut *f.lock())(v);
			}
		}))
	}

	/// Observes `Failed`, turning it into a callback; ignores every other event.
	pub fn observe_failed(
		&self,
		f: impl FnMut(E) + Send + 'static,
	) -> Option<Arc<dyn Disposable>>
	where
		V: Send,
	{
		let f = Mutex::new(f);
		self.observe(Observer::new(move |event| {
			if let Event::Failed(e) = event {
				(&mut *f.lock())(e);
			}
		}))
	}

	/// Runs `f` exactly once, when (and if) the signal completes.
	pub fn observe_completed(&self, f: impl FnOnce() + Send + 'static) -> Option<Arc<dyn Disposable>>
	where
		V: Send,
		E: Send,
	{
		let f = Mutex::new(Some(f));
		self.observe(Observer::new(move |event| {
			if matches!(event, Event::Completed) {
				if let Some(f) = f.lock().take() {
					f();
				}
			}
		}))
	}

	/// Runs `f` exactly once, when (and if) the signal is interrupted.
	pub fn observe_interrupted(
		&self,
		f: impl FnOnce() + Send + 'static,
	) -> Option<Arc<dyn Disposable>>
	where
		V: Send,
		E: Send,
	{
		let f = Mutex::new(Some(f));
		self.observe(Observer::new(move |event| {
			if matches!(event, Event::Interrupted) {
				if let Some(f) = f.lock().take() {
					f();
				}
			}
		}))
	}

	/// Observes the stream as a `Result`-shaped callback for values/failure,
	/// ignoring `Completed`/`Interrupted`.
	pub fn observe_result(
		&self,
		f: impl FnMut(Result<V, E>) + Send + 'static,
	) -> Option<Arc<dyn Disposable>> {
		let f = Mutex::new(f);
		self.observe(Observer::new(move |event| match event {
			Event::Value(v) => (&mut *f.lock())(Ok(v)),
			Event::Failed(e) => (&mut *f.lock())(Err(e)),
			Event::Completed | Event::Interrupted => {}
		}))
	}
}

/// Returns a manually driven `(signal, observer, interrupt-disposable)` triple.
///
/// Sending to the observer drives the signal directly; disposing the returned
/// disposable sends `Interrupted` on the signal (a no-op if it has already
/// terminated).
pub fn pipe<V: 'static + Send + Clone, E: 'static + Send + Clone>(
) -> (Signal<V, E>, Observer<V, E>, Arc<dyn Disposable>) {
	let cell: Arc<Mutex<Option<Observer<V, E>>>> = Arc::new(Mutex::new(None));
	let signal = Signal::new({
		let cell = Arc::clone(&cell);
		move |observer| {
			*cell.lock() = Some(observer);
			None
		}
	});
	let input = cell.lock().clone().expect("generator runs synchronously");
	let interrupt = ActionDisposable::new({
		let input = input.clone();
		move || input.send_interrupted()
	});
	(signal, input, interrupt)
}

/// Drains `inner.pending`, serializing concurrent/re-entrant sends into one
/// strict total order. See [`Signal`]'s module docs and design note on
/// re-entrant sends.
fn internal_send<V: 'static + Send + Clone, E: 'static + Send + Clone>(
	inner: &Arc<Inner<V, E>>,
	event: Event<V, E>,
) {
	inner.pending.lock().push_back(event);
	if inner.draining.swap(true, Ordering::AcqRel) {
		// Another call (this thread, re-entrantly, or a racing thread) is
		// already draining the queue; it will pick this event up in order.
		return;
	}
	loop {
		loop {
			let next = inner.pending.lock().pop_front();
			let Some(event) = next else { break };
			dispatch(inner, event);
		}
		inner.draining.store(false, Ordering::Release);
		// A concurrent pusher may have observed `draining == true` (and so
		// returned without dispatching) in the gap between our last empty
		// `pop_front` and the `store` above, stranding its event. Re-check
		// the queue and, if it's non-empty, try to resume draining; if
		// another thread has already claimed the slot in the meantime, it
		// is responsible for that event instead.
		if inner.pending.lock().is_empty() {
			break;
		}
		if inner.draining.swap(true, Ordering::AcqRel) {
			break;
		}
	}
}

fn dispatch<V: 'static + Send + Clone, E: 'static + Send + Clone>(
	inner: &Arc<Inner<V, E>>,
	event: Event<V, E>,
) {
	if event.is_terminal() {
		let (observers, generator_disposable) = {
			let mut state = inner.state.lock();
			match std::mem::replace(&mut *state, State::Terminated) {
				State::Alive {
					observers,
					generator_disposable,
					..
				} => (observers, generator_disposable),
				State::Terminated => {
					log::trace!(
						target: "flourish::signal",
						"dropping event sent after signal already terminated"
					);
					return;
				}
			}
		};
		log::trace!(target: "flourish::signal", "signal terminating");
		if let Some(d) = generator_disposable {
			d.dispose();
		}
		for observer in observers.into_values() {
			observer.send(event.clone());
		}
	} else {
		let observers: Vec<Observer<V, E>> = match &*inner.state.lock() {
			State::Alive { observers, .. } => observers.values().cloned().collect(),
			State::Terminated => return,
		};
		for observer in observers {
			observer.send(event.clone());
		}
	}
}
