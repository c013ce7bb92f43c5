use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc, Mutex,
};

use flourish::{ActionDisposable, Disposable, Event, Observer, SignalProducer};
use flourish_extra::{replay_lazily, retry, then, times};

#[test]
fn times_reruns_the_producer_from_scratch_n_times() {
	let run_count = Arc::new(AtomicUsize::new(0));
	let producer = SignalProducer::<i32, String>::new({
		let run_count = Arc::clone(&run_count);
		move |observer, _lifetime| {
			let n = run_count.fetch_add(1, Ordering::SeqCst) + 1;
			observer.send_value(n as i32);
			observer.send_completed();
			None
		}
	});
	let repeated = times(&producer, 3);
	let received = Arc::new(Mutex::new(Vec::new()));
	let completed = Arc::new(Mutex::new(false));
	repeated.start(Observer::new({
		let received = Arc::clone(&received);
		let completed = Arc::clone(&completed);
		move |event: Event<i32, String>| match event {
			Event::Value(v) => received.lock().unwrap().push(v),
			Event::Completed => *completed.lock().unwrap() = true,
			_ => {}
		}
	}));
	assert_eq!(received.lock().unwrap().as_slice(), [1, 2, 3]);
	assert!(*completed.lock().unwrap());
}

#[test]
fn times_with_zero_completes_without_ever_running_the_producer() {
	let ran = Arc::new(AtomicUsize::new(0));
	let producer = SignalProducer::<i32, String>::new({
		let ran = Arc::clone(&ran);
		move |observer, _lifetime| {
			ran.fetch_add(1, Ordering::SeqCst);
			observer.send_completed();
			None
		}
	});
	let repeated = times(&producer, 0);
	let completed = Arc::new(Mutex::new(false));
	repeated.start(Observer::new({
		let completed = Arc::clone(&completed);
		move |event: Event<i32, String>| {
			if matches!(event, Event::Completed) {
				*completed.lock().unwrap() = true;
			}
		}
	}));
	assert!(*completed.lock().unwrap());
	assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn retry_restarts_on_failure_up_to_n_times_then_gives_up() {
	let attempts = Arc::new(AtomicUsize::new(0));
	let producer = SignalProducer::<i32, String>::new({
		let attempts = Arc::clone(&attempts);
		move |observer, _lifetime| {
			let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
			observer.send_failed(format!("attempt {attempt}"));
			None
		}
	});
	let retried = retry(&producer, 2);
	let received = Arc::new(Mutex::new(Vec::new()));
	retried.start(Observer::new({
		let received = Arc::clone(&received);
		move |event: Event<i32, String>| {
			if let Event::Failed(e) = event {
				received.lock().unwrap().push(e);
			}
		}
	}));
	// 1 initial attempt + 2 retries = 3 attempts total; only the last
	// failure is ever forwarded downstream.
	assert_eq!(attempts.load(Ordering::SeqCst), 3);
	assert_eq!(received.lock().unwrap().as_slice(), ["attempt 3"]);
}

#[test]
fn retry_does_not_retry_on_success() {
	let attempts = Arc::new(AtomicUsize::new(0));
	let producer = SignalProducer::<i32, String>::new({
		let attempts = Arc::clone(&attempts);
		move |observer, _lifetime| {
			attempts.fetch_add(1, Ordering::SeqCst);
			observer.send_value(1);
			observer.send_completed();
			None
		}
	});
	let retried = retry(&producer, 5);
	let received = Arc::new(Mutex::new(Vec::new()));
	retried.start(Observer::new({
		let received = Arc::clone(&received);
		move |event: Event<i32, String>| {
			if let Event::Value(v) = event {
				received.lock().unwrap().push(v);
			}
		}
	}));
	assert_eq!(attempts.load(Ordering::SeqCst), 1);
	assert_eq!(received.lock().unwrap().as_slice(), [1]);
}

#[test]
fn then_discards_the_first_producers_values_and_chains_to_the_next() {
	let first = SignalProducer::<i32, String>::values([1, 2]);
	let second = SignalProducer::<i32, String>::values([10, 20]);
	let chained = then(&first, &second);
	let received = Arc::new(Mutex::new(Vec::new()));
	chained.start(Observer::new({
		let received = Arc::clone(&received);
		move |event: Event<i32, String>| {
			if let Event::Value(v) = event {
				received.lock().unwrap().push(v);
			}
		}
	}));
	assert_eq!(received.lock().unwrap().as_slice(), [10, 20]);
}

#[test]
fn then_propagates_a_failure_from_the_first_producer_without_starting_the_next() {
	let first = SignalProducer::<i32, String>::error("broke".to_string());
	let second_ran = Arc::new(Mutex::new(false));
	let second = SignalProducer::<i32, String>::new({
		let second_ran = Arc::clone(&second_ran);
		move |observer, _lifetime| {
			*second_ran.lock().unwrap() = true;
			observer.send_completed();
			None
		}
	});
	let chained = then(&first, &second);
	let received = Arc::new(Mutex::new(Vec::new()));
	chained.start(Observer::new({
		let received = Arc::clone(&received);
		move |event: Event<i32, String>| received.lock().unwrap().push(format!("{event:?}"))
	}));
	assert_eq!(received.lock().unwrap().as_slice(), ["Failed(\"broke\")"]);
	assert!(!*second_ran.lock().unwrap());
}

#[test]
fn replay_lazily_starts_the_shared_run_only_once_and_replays_to_late_subscribers() {
	let run_count = Arc::new(AtomicUsize::new(0));
	let (upstream, upstream_observer, _interrupt) = flourish::pipe::<i32, String>();
	let upstream_for_producer = Mutex::new(Some(upstream));
	let producer = SignalProducer::<i32, String>::new(move |observer, _lifetime| {
		run_count.fetch_add(1, Ordering::SeqCst);
		upstream_for_producer.lock().unwrap().take().unwrap().observe(observer)
	});
	let shared = replay_lazily(&producer, 1);

	let first = Arc::new(Mutex::new(Vec::new()));
	shared.start(Observer::new({
		let first = Arc::clone(&first);
		move |event: Event<i32, String>| {
			if let Event::Value(v) = event {
				first.lock().unwrap().push(v);
			}
		}
	}));
	upstream_observer.send_value(1);
	upstream_observer.send_value(2);

	// A late subscriber is replayed the last value (cap 1), not the whole
	// history, and observes every value from here on.
	let second = Arc::new(Mutex::new(Vec::new()));
	shared.start(Observer::new({
		let second = Arc::clone(&second);
		move |event: Event<i32, String>| {
			if let Event::Value(v) = event {
				second.lock().unwrap().push(v);
			}
		}
	}));
	upstream_observer.send_value(3);

	assert_eq!(first.lock().unwrap().as_slice(), [1, 2, 3]);
	assert_eq!(second.lock().unwrap().as_slice(), [2, 3]);
}

#[test]
fn replay_lazily_replays_buffer_and_terminal_to_a_subscriber_joining_after_completion() {
	let producer = SignalProducer::<i32, String>::values([1, 2, 3]);
	let shared = replay_lazily(&producer, 2);

	// First run (and the only run: replay_lazily shares it) drains and
	// terminates synchronously since `values` completes immediately.
	shared.start(Observer::sink());

	let late = Arc::new(Mutex::new(Vec::new()));
	let completed = Arc::new(Mutex::new(false));
	shared.start(Observer::new({
		let late = Arc::clone(&late);
		let completed = Arc::clone(&completed);
		move |event: Event<i32, String>| match event {
			Event::Value(v) => late.lock().unwrap().push(v),
			Event::Completed => *completed.lock().unwrap() = true,
			_ => {}
		}
	}));

	assert_eq!(late.lock().unwrap().as_slice(), [2, 3]);
	assert!(*completed.lock().unwrap());
}

#[test]
fn replay_lazily_disposes_the_shared_run_once_the_last_subscriber_leaves() {
	let torn_down = Arc::new(AtomicUsize::new(0));
	let producer = SignalProducer::<i32, String>::new({
		let torn_down = Arc::clone(&torn_down);
		move |_observer, _lifetime| {
			// Never sends a terminal: the shared run stays in flight until
			// something disposes it.
			let torn_down = Arc::clone(&torn_down);
			Some(ActionDisposable::new(move || {
				torn_down.fetch_add(1, Ordering::SeqCst);
			}))
		}
	});
	let shared = replay_lazily(&producer, 1);

	let subscription = shared.start(Observer::sink());
	assert_eq!(torn_down.load(Ordering::SeqCst), 0);

	subscription.dispose();
	assert_eq!(torn_down.load(Ordering::SeqCst), 1);
}
