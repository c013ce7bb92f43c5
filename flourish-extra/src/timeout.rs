//! Timeouts, implemented the way the core crate intends them to be: as a race
//! between the producer itself and a scheduled failure, not as a built-in
//! timeout field on any signal or producer.

use std::{
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

use flourish::{CompositeDisposable, Disposable, Event, Observer, Scheduler, SignalProducer};

/// Runs `producer`; if no terminal event has arrived within `after`, cancels
/// it and fails with `on_timeout()` instead. Values are always forwarded as
/// they arrive — only the *first terminal to occur*, whichever side it comes
/// from, is actually delivered.
pub fn timeout<V, E>(
	producer: &SignalProducer<V, E>,
	after: Duration,
	scheduler: Scheduler,
	on_timeout: impl Fn() -> E + Send + Sync + 'static,
) -> SignalProducer<V, E>
where
	V: 'static + Send + Clone,
	E: 'static + Send + Clone,
{
	let producer = producer.clone();
	SignalProducer::new(move |observer, _lifetime| {
		let composite = CompositeDisposable::new();
		let decided = Arc::new(AtomicBool::new(false));

		let main_observer = {
			let observer = observer.clone();
			let decided = Arc::clone(&decided);
			Observer::new(move |event: Event<V, E>| {
				if event.is_terminal() && decided.swap(true, Ordering::AcqRel) {
					// The timeout already won the race and delivered its own
					// failure; this terminal lost and is dropped.
					return;
				}
				observer.send(event);
			})
		};
		let main_sub = producer.start(main_observer);
		composite.add(Arc::clone(&main_sub));

		let timer_decided = Arc::clone(&decided);
		let timer_observer = observer.clone();
		match scheduler.schedule_after(Instant::now() + after, move || {
			if !timer_decided.swap(true, Ordering::AcqRel) {
				timer_observer.send_failed(on_timeout());
				main_sub.dispose();
			}
		}) {
			Ok(job) => composite.add(job),
			Err(error) => log::debug!(target: "flourish_extra::timeout", "could not arm timeout: {error}"),
		}

		let disposable: Arc<dyn Disposable> = composite;
		Some(disposable)
	})
}
