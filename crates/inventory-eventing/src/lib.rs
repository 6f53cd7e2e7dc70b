//! inventory-eventing — change notifications for committed mutations.
//!
//! The [`EventGateway`] turns each successful create, update or delete into
//! one [`Event`] and hands it to a [`Producer`]. Delivery is best effort:
//! a failed or slow producer is logged, counted and published on a
//! failure channel, and never fails the request that caused it.
//!
//! | Producer | Target |
//! |---|---|
//! | [`StdoutProducer`] | one JSON line per event |
//! | [`ChannelProducer`] | a tokio mpsc receiver in-process |
//! | [`NoopProducer`] | nothing (eventing disabled) |

pub mod error;
pub mod event;
pub mod gateway;
pub mod producer;

pub use error::EventError;
pub use event::{Event, EventKind};
pub use gateway::{EmitFailure, EventGateway};
pub use producer::{ChannelProducer, NoopProducer, Producer, StdoutProducer};
