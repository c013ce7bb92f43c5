use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use flourish::{Event, Lifetime, Observer, Scheduler};

#[test]
fn map_transforms_every_value() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.map(|v| v * 10).observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	observer.send_value(1);
	observer.send_value(2);
	observer.send_value(3);
	assert_eq!(received.lock().unwrap().as_slice(), [10, 20, 30]);
}

#[test]
fn filter_forwards_only_matching_values() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.filter(|v| v % 2 == 0).observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	for v in 1..=5 {
		observer.send_value(v);
	}
	assert_eq!(received.lock().unwrap().as_slice(), [2, 4]);
}

#[test]
fn map_error_transforms_only_the_failure() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.map_error(|e: String| e.len()).observe(Observer::new({
		let received = Arc::clone(&received);
		move |event: Event<i32, usize>| received.lock().unwrap().push(format!("{event:?}"))
	}));
	observer.send_failed("oops".to_string());
	assert_eq!(received.lock().unwrap().as_slice(), ["Failed(4)"]);
}

#[test]
fn materialize_reports_the_terminal_as_a_value_then_completes() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.materialize().observe_values({
		let received = Arc::clone(&received);
		move |v: Event<i32, String>| received.lock().unwrap().push(format!("{v:?}"))
	});
	observer.send_value(1);
	observer.send_completed();
	assert_eq!(received.lock().unwrap().as_slice(), ["Value(1)", "Completed"]);
}

#[test]
fn take_completes_after_n_values_even_if_upstream_keeps_going() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	let completed = Arc::new(Mutex::new(false));
	signal.take(2).observe(Observer::new({
		let received = Arc::clone(&received);
		let completed = Arc::clone(&completed);
		move |event: Event<i32, String>| match event {
			Event::Value(v) => received.lock().unwrap().push(v),
			Event::Completed => *completed.lock().unwrap() = true,
			_ => {}
		}
	}));
	observer.send_value(1);
	observer.send_value(2);
	observer.send_value(3);
	assert_eq!(received.lock().unwrap().as_slice(), [1, 2]);
	assert!(*completed.lock().unwrap());
}

#[test]
fn take_during_completes_once_the_lifetime_ends() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let (lifetime, token) = Lifetime::make();
	let received = Arc::new(Mutex::new(Vec::new()));
	let completed = Arc::new(Mutex::new(false));
	signal.take_during(&lifetime).observe(Observer::new({
		let received = Arc::clone(&received);
		let completed = Arc::clone(&completed);
		move |event: Event<i32, String>| match event {
			Event::Value(v) => received.lock().unwrap().push(v),
			Event::Completed => *completed.lock().unwrap() = true,
			_ => {}
		}
	}));
	observer.send_value(1);
	drop(token);
	observer.send_value(2);
	assert_eq!(received.lock().unwrap().as_slice(), [1]);
	assert!(*completed.lock().unwrap());
}

#[test]
fn skip_drops_the_first_n_values() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.skip(2).observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	for v in [1, 2, 3, 4] {
		observer.send_value(v);
	}
	assert_eq!(received.lock().unwrap().as_slice(), [3, 4]);
}

#[test]
fn skip_repeats_drops_consecutive_equal_values() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.skip_repeats_eq().observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	for v in [1, 1, 2, 2, 2, 1] {
		observer.send_value(v);
	}
	assert_eq!(received.lock().unwrap().as_slice(), [1, 2, 1]);
}

#[test]
fn observe_on_redispatches_through_the_scheduler_preserving_order() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let scheduler = Scheduler::queue("observe-on-test");
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.observe_on(scheduler).observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	observer.send_value(1);
	observer.send_value(2);
	observer.send_value(3);
	std::thread::sleep(Duration::from_millis(50));
	assert_eq!(received.lock().unwrap().as_slice(), [1, 2, 3]);
}

#[test]
fn attempt_turns_an_err_into_a_failure_and_stops_there() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal
		.attempt(|v| if *v < 0 { Err("negative".to_string()) } else { Ok(()) })
		.observe(Observer::new({
			let received = Arc::clone(&received);
			move |event: Event<i32, String>| received.lock().unwrap().push(format!("{event:?}"))
		}));
	observer.send_value(1);
	observer.send_value(-1);
	observer.send_value(2);
	assert_eq!(
		received.lock().unwrap().as_slice(),
		["Value(1)", "Failed(\"negative\")"]
	);
}

#[test]
fn attempt_map_transforms_and_can_fail() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal
		.attempt_map(|v| if v == 0 { Err("zero".to_string()) } else { Ok(100 / v) })
		.observe(Observer::new({
			let received = Arc::clone(&received);
			move |event: Event<i32, String>| received.lock().unwrap().push(format!("{event:?}"))
		}));
	observer.send_value(10);
	observer.send_value(0);
	assert_eq!(received.lock().unwrap().as_slice(), ["Value(10)", "Failed(\"zero\")"]);
}

#[test]
fn flat_map_error_recovers_with_a_replacement_signal() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	// Built ahead of time and idle: by the time `flat_map_error`'s own
	// `observe` call attaches its real subscriber, this signal hasn't
	// emitted anything yet, so the subscriber sees every later event.
	let (replacement, replacement_observer, _replacement_interrupt) = flourish::pipe::<i32, i32>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal
		.flat_map_error(move |_e| replacement.clone())
		.observe(Observer::new({
			let received = Arc::clone(&received);
			move |event: Event<i32, i32>| received.lock().unwrap().push(format!("{event:?}"))
		}));
	observer.send_value(1);
	observer.send_failed("oops".to_string());
	replacement_observer.send_value(9);
	replacement_observer.send_value(10);
	replacement_observer.send_completed();
	assert_eq!(
		received.lock().unwrap().as_slice(),
		["Value(1)", "Value(9)", "Value(10)", "Completed"]
	);
}

#[test]
fn collect_buffers_every_value_into_one_vec_at_completion() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.collect().observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	observer.send_value(1);
	observer.send_value(2);
	observer.send_value(3);
	observer.send_completed();
	assert_eq!(received.lock().unwrap().as_slice(), [vec![1, 2, 3]]);
}

#[test]
fn reduce_folds_into_a_single_final_value() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.reduce(0, |acc, v| acc + v).observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	for v in [1, 2, 3, 4] {
		observer.send_value(v);
	}
	observer.send_completed();
	assert_eq!(received.lock().unwrap().as_slice(), [10]);
}

#[test]
fn dematerialize_inverts_materialize() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal
		.materialize()
		.dematerialize()
		.observe(Observer::new({
			let received = Arc::clone(&received);
			move |event: Event<i32, String>| received.lock().unwrap().push(format!("{event:?}"))
		}));
	observer.send_value(1);
	observer.send_failed("bad".to_string());
	assert_eq!(received.lock().unwrap().as_slice(), ["Value(1)", "Failed(\"bad\")"]);
}
