//! Long-running tasks spawned from `main`. Each stops when its
//! [`CancellationToken`](tokio_util::sync::CancellationToken) fires.

pub mod sweeper;
