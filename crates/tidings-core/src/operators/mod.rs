#![forbid(unsafe_code)]

//! Operators: publishers built on top of other publishers.
//!
//! Each operator owns its upstream(s) and subscribes to them only when it is
//! itself subscribed to. The token it returns owns the upstream tokens, so
//! cancelling (or dropping) a downstream subscription always tears down the
//! whole chain above it.
//!
//! | Operator | Per-subscription state |
//! |---|---|
//! | [`Map`], [`Filter`] | none |
//! | [`DropFirst`] | countdown |
//! | [`Debounce`] | pending scheduled delivery |
//! | [`ReceiveOn`] | liveness flag |
//! | [`CombineLatest`] (and 3/4) | latest value per input |
//! | [`MakeConnectable`], [`Autoconnect`] | shared connection count |

pub mod combine_latest;
pub mod connect;
pub mod debounce;
pub mod drop_first;
pub mod filter;
pub mod map;
pub mod receive_on;

pub use combine_latest::{CombineLatest, CombineLatest3, CombineLatest4};
pub use connect::{Autoconnect, MakeConnectable};
pub use debounce::Debounce;
pub use drop_first::DropFirst;
pub use filter::Filter;
pub use map::Map;
pub use receive_on::ReceiveOn;
