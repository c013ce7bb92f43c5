//! Scheduler-driven timing operators: `debounce`, `throttle`, `sample(on:)`,
//! `withLatest(from:)`.

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use parking_lot::Mutex;

use flourish::{CompositeDisposable, Disposable, Event, Observer, Scheduler, Signal};

/// Emits the last value of a run of values once `interval` has passed without
/// a further one arriving; resets the window on every new value. Terminal
/// events flush any still-pending value first, then pass through unchanged.
pub fn debounce<V, E>(signal: &Signal<V, E>, interval: Duration, scheduler: Scheduler) -> Signal<V, E>
where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let upstream = signal.clone();
	Signal::new(move |observer| {
		let composite = CompositeDisposable::new();
		let timer = flourish::SerialDisposable::new();
		composite.add(Arc::clone(&timer) as Arc<dyn Disposable>);
		let pending: Arc<Mutex<Option<V>>> = Arc::new(Mutex::new(None));

		if let Some(d) = upstream.observe(Observer::new({
			let observer = observer.clone();
			let pending = Arc::clone(&pending);
			let timer = Arc::clone(&timer);
			move |event| match event {
				Event::Value(v) => {
					*pending.lock() = Some(v);
					let observer = observer.clone();
					let pending = Arc::clone(&pending);
					match scheduler.schedule_after(Instant::now() + interval, move || {
						if let Some(v) = pending.lock().take() {
							observer.send_value(v);
						}
					}) {
						Ok(job) => timer.set(job),
						Err(error) => log::debug!(
							target: "flourish_extra::debounce",
							"dropped a debounce window: {error}"
						),
					}
				}
				other => {
					timer.dispose();
					if let Some(v) = pending.lock().take() {
						observer.send_value(v);
					}
					observer.send(other);
				}
			}
		})) {
			composite.add(d);
		}

		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}

struct ThrottleState<V> {
	in_window: bool,
	pending: Option<V>,
}

/// Forwards the first value immediately, then drops values arriving within
/// `interval` of it, retaining only the latest for a trailing emission once
/// the window elapses. A new window starts from that trailing emission, if
/// there was one; otherwise the next value starts a fresh window immediately.
pub fn throttle<V, E>(signal: &Signal<V, E>, interval: Duration, scheduler: Scheduler) -> Signal<V, E>
where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let upstream = signal.clone();
	Signal::new(move |observer| {
		let composite = CompositeDisposable::new();
		let timer = flourish::SerialDisposable::new();
		composite.add(Arc::clone(&timer) as Arc<dyn Disposable>);
		let state = Arc::new(Mutex::new(ThrottleState {
			in_window: false,
			pending: None,
		}));

		if let Some(d) = upstream.observe(Observer::new({
			let observer = observer.clone();
			let scheduler = scheduler.clone();
			let state = Arc::clone(&state);
			let timer = Arc::clone(&timer);
			move |event| match event {
				Event::Value(v) => {
					let mut guard = state.lock();
					if guard.in_window {
						guard.pending = Some(v);
						return;
					}
					guard.in_window = true;
					drop(guard);
					observer.send_value(v);
					arm_throttle_window(&observer, &scheduler, &state, &timer, interval);
				}
				other => {
					timer.dispose();
					observer.send(other);
				}
			}
		})) {
			composite.add(d);
		}

		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}

fn arm_throttle_window<V, E>(
	observer: &Observer<V, E>,
	scheduler: &Scheduler,
	state: &Arc<Mutex<ThrottleState<V>>>,
	timer: &Arc<flourish::SerialDisposable>,
	interval: Duration,
) where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let observer = observer.clone();
	let scheduler_for_rearm = scheduler.clone();
	let state = Arc::clone(state);
	let timer_for_rearm = Arc::clone(timer);
	match scheduler.schedule_after(Instant::now() + interval, move || {
		let pending = {
			let mut guard = state.lock();
			let pending = guard.pending.take();
			if pending.is_none() {
				guard.in_window = false;
			}
			pending
		};
		if let Some(v) = pending {
			observer.send_value(v);
			arm_throttle_window(&observer, &scheduler_for_rearm, &state, &timer_for_rearm, interval);
		}
	}) {
		Ok(job) => timer.set(job),
		Err(error) => log::debug!(target: "flourish_extra::throttle", "dropped a throttle window: {error}"),
	}
}

/// Emits the latest value of `signal` each time `sampler` emits a value,
/// after `signal` has emitted at least once. A terminal from either side
/// terminates the sample.
pub fn sample_on<V, S, E>(signal: &Signal<V, E>, sampler: &Signal<S, E>) -> Signal<V, E>
where
	V: 'static + Send + Clone,
	S: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let source = signal.clone();
	let sampler = sampler.clone();
	Signal::new(move |observer| {
		let composite = CompositeDisposable::new();
		let latest: Arc<Mutex<Option<V>>> = Arc::new(Mutex::new(None));

		if let Some(d) = source.observe(Observer::new({
			let latest = Arc::clone(&latest);
			let observer = observer.clone();
			move |event| match event {
				Event::Value(v) => *latest.lock() = Some(v),
				Event::Failed(e) => observer.send_failed(e),
				Event::Completed => observer.send_completed(),
				Event::Interrupted => observer.send_interrupted(),
			}
		})) {
			composite.add(d);
		}

		if let Some(d) = sampler.observe(Observer::new({
			let latest = Arc::clone(&latest);
			let observer = observer.clone();
			move |event| match event {
				Event::Value(_) => {
					if let Some(v) = latest.lock().clone() {
						observer.send_value(v);
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

/// Pairs every value `signal` emits with the latest value `other` has
/// emitted so far, dropping `signal`'s values until `other` has emitted at
/// least once. Lifecycle (failure/completion/interruption) is driven by
/// `signal` alone; `other`'s terminal is ignored.
pub fn with_latest_from<V, O, E>(signal: &Signal<V, E>, other: &Signal<O, E>) -> Signal<(V, O), E>
where
	V: 'static + Send + Clone,
	O: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let main = signal.clone();
	let other = other.clone();
	Signal::new(move |observer| {
		let composite = CompositeDisposable::new();
		let latest_other: Arc<Mutex<Option<O>>> = Arc::new(Mutex::new(None));

		if let Some(d) = other.observe(Observer::new({
			let latest_other = Arc::clone(&latest_other);
			move |event| {
				if let Event::Value(v) = event {
					*latest_other.lock() = Some(v);
				}
			}
		})) {
			composite.add(d);
		}

		if let Some(d) = main.observe(Observer::new({
			let latest_other = Arc::clone(&latest_other);
			let observer = observer.clone();
			move |event| match event {
				Event::Value(v) => {
					if let Some(o) = latest_other.lock().clone() {
						observer.send_value((v, o));
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
