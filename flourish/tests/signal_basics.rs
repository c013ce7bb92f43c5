use std::sync::{Arc, Mutex};

use flourish::{Event, Observer, Signal};

#[test]
fn new_runs_generator_synchronously_and_delivers_values_in_order() {
	let log = Arc::new(Mutex::new(Vec::new()));
	let signal = Signal::<i32, String>::new({
		let log = Arc::clone(&log);
		move |observer| {
			observer.send_value(1);
			observer.send_value(2);
			log.lock().unwrap().push("generator ran".to_string());
			None
		}
	});
	assert_eq!(log.lock().unwrap().as_slice(), ["generator ran"]);

	let received = Arc::new(Mutex::new(Vec::new()));
	signal.observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	// Values sent before any observer attached are gone; only later ones count.
	assert!(received.lock().unwrap().is_empty());
}

#[test]
fn observe_receives_values_sent_after_subscription() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	let _sub = signal.observe_values({
		let received = Arc::clone(&received);
		move |v| received.lock().unwrap().push(v)
	});
	observer.send_value(10);
	observer.send_value(20);
	assert_eq!(received.lock().unwrap().as_slice(), [10, 20]);
}

#[test]
fn at_most_one_terminal_is_delivered() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let terminals = Arc::new(Mutex::new(Vec::new()));
	signal.observe(Observer::new({
		let terminals = Arc::clone(&terminals);
		move |event: Event<i32, String>| {
			if event.is_terminal() {
				terminals.lock().unwrap().push(format!("{event:?}"));
			}
		}
	}));
	observer.send_completed();
	// A second terminal after the first must not be delivered.
	observer.send_failed("late".to_string());
	assert_eq!(terminals.lock().unwrap().len(), 1);
	assert_eq!(terminals.lock().unwrap()[0], "Completed");
}

#[test]
fn late_subscriber_to_a_terminated_signal_gets_synthetic_interrupted() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	observer.send_completed();

	let received = Arc::new(Mutex::new(Vec::new()));
	let subscription = signal.observe(Observer::new({
		let received = Arc::clone(&received);
		move |event: Event<i32, String>| received.lock().unwrap().push(format!("{event:?}"))
	}));
	assert!(subscription.is_none());
	assert_eq!(received.lock().unwrap().as_slice(), ["Interrupted"]);
}

#[test]
fn disposing_the_pipe_interrupt_sends_interrupted() {
	let (signal, _observer, interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.observe(Observer::new({
		let received = Arc::clone(&received);
		move |event: Event<i32, String>| received.lock().unwrap().push(format!("{event:?}"))
	}));
	interrupt.dispose();
	assert_eq!(received.lock().unwrap().as_slice(), ["Interrupted"]);
}

#[test]
fn disposing_an_individual_subscription_stops_only_that_observer() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let a = Arc::new(Mutex::new(Vec::new()));
	let b = Arc::new(Mutex::new(Vec::new()));
	let sub_a = signal
		.observe_values({
			let a = Arc::clone(&a);
			move |v| a.lock().unwrap().push(v)
		})
		.unwrap();
	signal.observe_values({
		let b = Arc::clone(&b);
		move |v| b.lock().unwrap().push(v)
	});

	observer.send_value(1);
	sub_a.dispose();
	observer.send_value(2);

	assert_eq!(a.lock().unwrap().as_slice(), [1]);
	assert_eq!(b.lock().unwrap().as_slice(), [1, 2]);
}

#[test]
fn reentrant_send_from_within_an_observer_is_serialized_in_order() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	let observer_for_reentry = observer.clone();
	signal.observe_values({
		let received = Arc::clone(&received);
		move |v| {
			received.lock().unwrap().push(v);
			// Re-entrant send from inside the handler for value 1: it must be
			// queued and delivered only after this call returns, not nested.
			if v == 1 {
				observer_for_reentry.send_value(3);
			}
		}
	});
	observer.send_value(1);
	observer.send_value(2);
	assert_eq!(received.lock().unwrap().as_slice(), [1, 3, 2]);
}

#[test]
fn observe_result_maps_value_and_failed_ignores_other_terminals() {
	let (signal, observer, _interrupt) = flourish::pipe::<i32, String>();
	let received = Arc::new(Mutex::new(Vec::new()));
	signal.observe_result({
		let received = Arc::clone(&received);
		move |r| received.lock().unwrap().push(r)
	});
	observer.send_value(1);
	observer.send_failed("oops".to_string());
	assert_eq!(
		received.lock().unwrap().as_slice(),
		[Ok(1), Err("oops".to_string())]
	);
}
