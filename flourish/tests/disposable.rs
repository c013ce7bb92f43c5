use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Arc,
};

use flourish::{ActionDisposable, CompositeDisposable, Disposable, NopDisposable, ScopedDisposable, SerialDisposable};

#[test]
fn nop_disposable_is_already_disposed() {
	let d = NopDisposable;
	assert!(d.is_disposed());
	d.dispose();
	assert!(d.is_disposed());
}

#[test]
fn action_disposable_runs_action_exactly_once() {
	let calls = Arc::new(AtomicUsize::new(0));
	let d = ActionDisposable::new({
		let calls = Arc::clone(&calls);
		move || {
			calls.fetch_add(1, Ordering::SeqCst);
		}
	});
	assert!(!d.is_disposed());
	d.dispose();
	d.dispose();
	d.dispose();
	assert_eq!(calls.load(Ordering::SeqCst), 1);
	assert!(d.is_disposed());
}

#[test]
fn action_disposable_notifies_on_disposed_immediately_if_already_disposed() {
	let d = ActionDisposable::new(|| {});
	d.dispose();
	let notified = Arc::new(AtomicUsize::new(0));
	d.on_disposed(Box::new({
		let notified = Arc::clone(&notified);
		move || {
			notified.fetch_add(1, Ordering::SeqCst);
		}
	}));
	assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[test]
fn composite_disposable_disposes_every_child_once() {
	let calls = Arc::new(AtomicUsize::new(0));
	let composite = CompositeDisposable::new();
	for _ in 0..3 {
		let calls = Arc::clone(&calls);
		composite.add(ActionDisposable::new(move || {
			calls.fetch_add(1, Ordering::SeqCst);
		}));
	}
	composite.dispose();
	assert_eq!(calls.load(Ordering::SeqCst), 3);

	// A child added after disposal is torn down immediately, not retained.
	let late_calls = Arc::new(AtomicUsize::new(0));
	composite.add(ActionDisposable::new({
		let late_calls = Arc::clone(&late_calls);
		move || {
			late_calls.fetch_add(1, Ordering::SeqCst);
		}
	}));
	assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn serial_disposable_disposes_previous_inner_on_replace() {
	let serial = SerialDisposable::new();
	let first_calls = Arc::new(AtomicUsize::new(0));
	serial.set(ActionDisposable::new({
		let first_calls = Arc::clone(&first_calls);
		move || {
			first_calls.fetch_add(1, Ordering::SeqCst);
		}
	}));
	assert_eq!(first_calls.load(Ordering::SeqCst), 0);

	let second_calls = Arc::new(AtomicUsize::new(0));
	serial.set(ActionDisposable::new({
		let second_calls = Arc::clone(&second_calls);
		move || {
			second_calls.fetch_add(1, Ordering::SeqCst);
		}
	}));
	assert_eq!(first_calls.load(Ordering::SeqCst), 1);
	assert_eq!(second_calls.load(Ordering::SeqCst), 0);

	serial.dispose();
	assert_eq!(second_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn serial_disposable_disposes_new_inner_immediately_once_already_disposed() {
	let serial = SerialDisposable::new();
	serial.dispose();
	let calls = Arc::new(AtomicUsize::new(0));
	serial.set(ActionDisposable::new({
		let calls = Arc::clone(&calls);
		move || {
			calls.fetch_add(1, Ordering::SeqCst);
		}
	}));
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn scoped_disposable_runs_on_drop_without_explicit_dispose() {
	let calls = Arc::new(AtomicUsize::new(0));
	{
		let _guard = ScopedDisposable::new({
			let calls = Arc::clone(&calls);
			move || {
				calls.fetch_add(1, Ordering::SeqCst);
			}
		});
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn scoped_disposable_explicit_dispose_then_drop_runs_once() {
	let calls = Arc::new(AtomicUsize::new(0));
	let guard = ScopedDisposable::new({
		let calls = Arc::clone(&calls);
		move || {
			calls.fetch_add(1, Ordering::SeqCst);
		}
	});
	guard.dispose();
	drop(guard);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}
