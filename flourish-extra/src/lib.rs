//! Timing- and restart-dependent operators that don't belong in the core
//! crate: they either need a [`Scheduler`](flourish::Scheduler) (debounce,
//! throttle) or rely on a producer's ability to start independent runs of its
//! underlying recipe (the `flatMap` strategies, `times`, `retry`, `then`,
//! `replayLazily`), which only makes sense for a [`SignalProducer`] and has no
//! equivalent on a already-running, already-multicast [`Signal`].

mod flat_map;
mod restart;
mod timeout;
mod timing;

pub use flat_map::{flat_map, FlatMapStrategy};
pub use restart::{replay_lazily, retry, then, times};
pub use timeout::timeout;
pub use timing::{debounce, sample_on, throttle, with_latest_from};
