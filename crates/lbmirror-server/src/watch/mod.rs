//! Watch sources feeding the reconciler.

mod kubernetes;

pub use kubernetes::{
    WatchConfig, WatchError, connect, observe, service_events, to_source_event,
};
