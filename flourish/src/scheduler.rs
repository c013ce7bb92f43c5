//! Serial execution surfaces: `immediate`, a queue-backed FIFO executor, and a
//! delay-capable scheduler built on top of the queue plus a monotonic clock.

use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		mpsc, Arc,
	},
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::disposable::{ActionDisposable, Disposable, NopDisposable};

/// A point in time, injected rather than read from the wall clock directly so
/// that delayed/repeating schedules can be driven by a fake clock in tests.
pub trait Clock: Send + Sync {
	/// The current instant according to this clock.
	fn now(&self) -> Instant;
}

/// The system monotonic clock. The only concrete [`Clock`] this crate provides;
/// anything else (virtual time, frame clocks) is a platform integration and out
/// of scope here.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Instant {
		Instant::now()
	}
}

/// Failure surfaced by [`Scheduler::schedule`] and friends when the backing
/// executor can no longer accept work. Distinct from stream failures (`E`):
/// this is a usage/lifecycle fault about the scheduler itself, not a value
/// flowing through any signal.
#[derive(Debug, Error)]
pub enum SchedulerError {
	/// The scheduler's worker thread has already shut down.
	#[error("scheduler {label:?} has shut down and can no longer accept work")]
	ShutDown {
		/// The scheduler's diagnostic label.
		label: String,
	},
}

type Job = Box<dyn FnOnce() + Send>;

enum Message {
	Run(Job, Arc<AtomicBool>),
	Shutdown,
}

/// A serial execution surface.
///
/// All three canonical implementations — [`Scheduler::immediate`],
/// [`Scheduler::queue`], and the delay/repeat methods layered on the queue —
/// execute work one at a time, in submission order, per scheduler instance.
#[derive(Clone)]
pub enum Scheduler {
	/// Runs work synchronously on the calling thread. Never returns a
	/// cancellable handle: by the time `schedule` returns, the work already ran.
	Immediate,
	/// A serial FIFO executor backed by a single worker thread.
	Queue(Arc<QueueInner>),
}

#[doc(hidden)]
pub struct QueueInner {
	label: String,
	sender: Mutex<Option<mpsc::Sender<Message>>>,
	handle: Mutex<Option<JoinHandle<()>>>,
	shut_down: Arc<AtomicBool>,
	clock: Arc<dyn Clock>,
}

impl Scheduler {
	/// The synchronous, calling-thread scheduler.
	pub fn immediate() -> Self {
		Scheduler::Immediate
	}

	/// Spawns a new named, serial worker thread, timed against [`SystemClock`].
	///
	/// `label` is used only for diagnostics (the worker thread's name and log
	/// target), mirroring how the teacher's process-wide scheduler instances
	/// carry a thread-affinity tag rather than mutable global state.
	pub fn queue(label: impl Into<String>) -> Self {
		Self::queue_with_clock(label, Arc::new(SystemClock))
	}

	/// Like [`queue`](Self::queue), but the delayed/repeating timer is driven
	/// by `clock` instead of [`SystemClock`] — the seam a test can use to
	/// drive delayed schedules deterministically instead of with real sleeps.
	pub fn queue_with_clock(label: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
		let label = label.into();
		let (sender, receiver) = mpsc::channel::<Message>();
		let shut_down = Arc::new(AtomicBool::new(false));
		let worker_label = label.clone();
		let worker_shut_down = Arc::clone(&shut_down);
		let handle = thread::Builder::new()
			.name(worker_label.clone())
			.spawn(move || {
				for message in receiver {
					match message {
						Message::Run(job, cancelled) => {
							if !cancelled.load(Ordering::Acquire) {
								log::trace!(target: "flourish::scheduler", "{worker_label}: running job");
								job();
							} else {
								log::trace!(target: "flourish::scheduler", "{worker_label}: job cancelled before it ran");
							}
						}
						Message::Shutdown => break,
					}
				}
				worker_shut_down.store(true, Ordering::Release);
			})
			.expect("failed to spawn scheduler worker thread");
		Scheduler::Queue(Arc::new(QueueInner {
			label,
			sender: Mutex::new(Some(sender)),
			handle: Mutex::new(Some(handle)),
			shut_down,
			clock,
		}))
	}

	/// A process-wide scheduler meant for the application's "main"/UI thread
	/// affinity tag. Platform bridges decide what "main" means; here it is just
	/// another named queue.
	pub fn main() -> Self {
		Scheduler::queue("main")
	}

	fn label(&self) -> &str {
		match self {
			Scheduler::Immediate => "immediate",
			Scheduler::Queue(inner) => &inner.label,
		}
	}

	/// Schedules `work` to run once. Returns a disposable that, if disposed
	/// before the work is dispatched, cancels it; disposing after it has
	/// started has no effect on the running body.
	pub fn schedule(
		&self,
		work: impl FnOnce() + Send + 'static,
	) -> Result<Arc<dyn Disposable>, SchedulerError> {
		match self {
			Scheduler::Immediate => {
				work();
				Ok(Arc::new(NopDisposable))
			}
			Scheduler::Queue(inner) => {
				let cancelled = Arc::new(AtomicBool::new(false));
				let guard = inner.sender.lock();
				let sender = guard.as_ref().ok_or_else(|| SchedulerError::ShutDown {
					label: inner.label.clone(),
				})?;
				sender
					.send(Message::Run(Box::new(work), Arc::clone(&cancelled)))
					.map_err(|_| SchedulerError::ShutDown {
						label: inner.label.clone(),
					})?;
				let disposable = ActionDisposable::new(move || {
					cancelled.store(true, Ordering::Release);
				});
				Ok(disposable)
			}
		}
	}

	/// Schedules `work` to run once, no sooner than `after`.
	///
	/// On [`Scheduler::Immediate`] this blocks the calling thread until
	/// `after`, matching immediate's contract of synchronous execution; this
	/// is the only scheduler variant for which blocking is acceptable (§1 of
	/// the core spec).
	pub fn schedule_after(
		&self,
		after: Instant,
		work: impl FnOnce() + Send + 'static,
	) -> Result<Arc<dyn Disposable>, SchedulerError> {
		match self {
			Scheduler::Immediate => {
				let now = Instant::now();
				if after > now {
					thread::sleep(after - now);
				}
				work();
				Ok(Arc::new(NopDisposable))
			}
			Scheduler::Queue(inner) => {
				let cancelled = Arc::new(AtomicBool::new(false));
				let disposable = ActionDisposable::new({
					let cancelled = Arc::clone(&cancelled);
					move || cancelled.store(true, Ordering::Release)
				});
				let this = self.clone();
				let label = self.label().to_string();
				let clock = Arc::clone(&inner.clock);
				thread::Builder::new()
					.name(format!("{label}-timer"))
					.spawn(move || {
						let now = clock.now();
						if after > now {
							thread::sleep(after - now);
						}
						if !cancelled.load(Ordering::Acquire) {
							// Re-enter the serial queue so the work still runs on the
							// scheduler's own worker thread, preserving per-scheduler
							// serialization.
							let _ = this.schedule(work);
						}
					})
					.expect("failed to spawn delayed-schedule timer thread");
				Ok(disposable)
			}
		}
	}

	/// Schedules `work` to run repeatedly, first no sooner than `after`, then at
	/// every `interval` thereafter.
	///
	/// Uses "schedule at next boundary": each tick is computed from the fixed
	/// start instant plus a whole multiple of `interval`, so a slow tick does
	/// not push every later tick back by the same amount (drift compensation),
	/// while ticks are never dispatched concurrently — the next tick is only
	/// scheduled once the previous job has actually run, since all dispatch
	/// goes back through the serial queue.
	///
	/// `leeway` is accepted for API compatibility with the schedulers this
	/// crate models, but since repeats are re-armed through the serial queue
	/// after each run (not through OS-level coalescing), it currently has no
	/// additional effect beyond the minimum delay already implied by
	/// `interval`.
	pub fn schedule_repeating(
		&self,
		after: Instant,
		interval: Duration,
		_leeway: Duration,
		work: impl FnMut() + Send + 'static,
	) -> Result<Arc<dyn Disposable>, SchedulerError> {
		let cancelled = Arc::new(AtomicBool::new(false));
		let disposable = ActionDisposable::new({
			let cancelled = Arc::clone(&cancelled);
			move || cancelled.store(true, Ordering::Release)
		});
		arm_tick(self.clone(), after, interval, cancelled, Box::new(work));
		Ok(disposable)
	}
}

/// Arms one tick of a repeating schedule, and re-arms itself after the tick
/// runs (unless it was cancelled first). Standalone rather than a method so
/// the recursion only ever has one scheduler value in play.
fn arm_tick(
	scheduler: Scheduler,
	next: Instant,
	interval: Duration,
	cancelled: Arc<AtomicBool>,
	mut work: Box<dyn FnMut() + Send>,
) {
	if cancelled.load(Ordering::Acquire) {
		return;
	}
	match &scheduler {
		Scheduler::Immediate => {
			let now = Instant::now();
			if next > now {
				thread::sleep(next - now);
			}
			if !cancelled.load(Ordering::Acquire) {
				work();
				arm_tick(scheduler, next + interval, interval, cancelled, work);
			}
		}
		Scheduler::Queue(inner) => {
			let label = scheduler.label().to_string();
			let clock = Arc::clone(&inner.clock);
			thread::Builder::new()
				.name(format!("{label}-timer"))
				.spawn(move || {
					let now = clock.now();
					if next > now {
						thread::sleep(next - now);
					}
					if cancelled.load(Ordering::Acquire) {
						return;
					}
					let cancelled_for_tick = Arc::clone(&cancelled);
					let scheduler_for_rearm = scheduler.clone();
					let _ = scheduler.schedule(move || {
						if cancelled_for_tick.load(Ordering::Acquire) {
							return;
						}
						work();
						arm_tick(
							scheduler_for_rearm,
							next + interval,
							interval,
							cancelled_for_tick,
							work,
						);
					});
				})
				.expect("failed to spawn repeating-schedule timer thread");
		}
	}
}

impl Drop for QueueInner {
	fn drop(&mut self) {
		if let Some(sender) = self.sender.lock().take() {
			let _ = sender.send(Message::Shutdown);
		}
		if let Some(handle) = self.handle.lock().take() {
			let _ = handle.join();
		}
	}
}

impl std::fmt::Debug for Scheduler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("Scheduler").field(&self.label()).finish()
	}
}
