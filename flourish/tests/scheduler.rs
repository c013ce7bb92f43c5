use std::{
	sync::{
		atomic::{AtomicUsize, Ordering},
		Arc, Mutex,
	},
	time::{Duration, Instant},
};

use flourish::{Disposable, Scheduler};

#[test]
fn immediate_runs_work_synchronously() {
	let ran = Arc::new(AtomicUsize::new(0));
	Scheduler::immediate()
		.schedule({
			let ran = Arc::clone(&ran);
			move || {
				ran.fetch_add(1, Ordering::SeqCst);
			}
		})
		.unwrap();
	assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn queue_runs_work_on_its_own_worker_in_submission_order() {
	let scheduler = Scheduler::queue("test-queue");
	let order = Arc::new(Mutex::new(Vec::new()));
	for i in 0..5 {
		let order = Arc::clone(&order);
		scheduler
			.schedule(move || {
				order.lock().unwrap().push(i);
			})
			.unwrap();
	}
	// The worker thread is serial FIFO; give it a moment to drain.
	std::thread::sleep(Duration::from_millis(50));
	assert_eq!(order.lock().unwrap().as_slice(), [0, 1, 2, 3, 4]);
}

#[test]
fn schedule_after_runs_no_sooner_than_the_deadline() {
	let scheduler = Scheduler::queue("test-delay");
	let ran_at = Arc::new(Mutex::new(None));
	let started = Instant::now();
	scheduler
		.schedule_after(Instant::now() + Duration::from_millis(30), {
			let ran_at = Arc::clone(&ran_at);
			move || {
				*ran_at.lock().unwrap() = Some(Instant::now());
			}
		})
		.unwrap();
	std::thread::sleep(Duration::from_millis(100));
	let elapsed = ran_at.lock().unwrap().unwrap() - started;
	assert!(elapsed >= Duration::from_millis(25));
}

#[test]
fn disposing_a_scheduled_job_before_it_runs_cancels_it() {
	let scheduler = Scheduler::queue("test-cancel");
	let ran = Arc::new(AtomicUsize::new(0));
	let job = scheduler
		.schedule_after(Instant::now() + Duration::from_millis(50), {
			let ran = Arc::clone(&ran);
			move || {
				ran.fetch_add(1, Ordering::SeqCst);
			}
		})
		.unwrap();
	job.dispose();
	std::thread::sleep(Duration::from_millis(100));
	assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn schedule_repeating_ticks_more_than_once_and_can_be_cancelled() {
	let scheduler = Scheduler::queue("test-repeat");
	let ticks = Arc::new(AtomicUsize::new(0));
	let job = scheduler
		.schedule_repeating(
			Instant::now() + Duration::from_millis(10),
			Duration::from_millis(10),
			Duration::from_millis(0),
			{
				let ticks = Arc::clone(&ticks);
				move || {
					ticks.fetch_add(1, Ordering::SeqCst);
				}
			},
		)
		.unwrap();
	std::thread::sleep(Duration::from_millis(60));
	job.dispose();
	let after_cancel = ticks.load(Ordering::SeqCst);
	assert!(after_cancel >= 2);
	std::thread::sleep(Duration::from_millis(60));
	assert_eq!(ticks.load(Ordering::SeqCst), after_cancel);
}

#[test]
fn debug_label_identifies_the_scheduler() {
	assert_eq!(format!("{:?}", Scheduler::immediate()), "Scheduler(\"immediate\")");
	assert_eq!(format!("{:?}", Scheduler::queue("my-queue")), "Scheduler(\"my-queue\")");
}

#[test]
fn dropping_a_queue_scheduler_joins_its_worker_thread_cleanly() {
	// The worker thread is told to shut down and joined from `QueueInner`'s
	// `Drop`; this must return promptly and not panic or hang.
	let scheduler = Scheduler::queue("test-drop");
	scheduler.schedule(|| {}).unwrap();
	drop(scheduler);
}
