//! A push-based signals runtime.
//!
//! The center of this crate is [`Signal`], a hot, multicast, push-based event
//! stream, and [`SignalProducer`], the cold, restartable recipe that
//! materializes a fresh `Signal` per subscriber. Around them sit the
//! collaborators every operator and every producer run needs:
//! [`Observer`]/[`Event`] (the sink and its payload), [`Disposable`]
//! (idempotent teardown), [`Scheduler`] (serial execution surfaces), and
//! [`Lifetime`] (an observable scope). [`Property`] layers a value cell on
//! top of a signal for the common "current value plus its change stream"
//! shape.

mod disposable;
mod event;
mod lifetime;
mod observer;
mod operators;
mod producer;
mod property;
mod scheduler;
mod signal;

pub use disposable::{
	ActionDisposable, CompositeDisposable, Disposable, NopDisposable, ScopedDisposable,
	SerialDisposable,
};
pub use event::{Event, Never};
pub use lifetime::{Lifetime, LifetimeToken};
pub use observer::Observer;
pub use operators::{combine_latest, merge, zip};
pub use producer::SignalProducer;
pub use property::{BindSource, MutableProperty, Property, RecursiveModifyError};
pub use scheduler::{Clock, Scheduler, SchedulerError, SystemClock};
pub use signal::{pipe, Signal};
