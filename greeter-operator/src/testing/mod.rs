//! Testing utilities for driving controllers without an API server.
//!
//! [`MemoryStore`] is a [`GreeterStore`](crate::controller::GreeterStore) that
//! behaves like the API server for the operations the controller uses: it
//! assigns resource versions, rejects stale status writes, and only persists
//! the status of written objects.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryStore::new());
//! let key = store.create(greeter)?;
//! let controller = GreeterController::new(Arc::new(ControllerContext::from_parts(
//!     store.clone(),
//!     Arc::new(NoopEvents),
//!     RequeuePolicy::default(),
//! )));
//! controller.reconcile(&key, &CancellationToken::new()).await?;
//! assert_eq!(store.status_writes(), 1);
//! ```

mod memory_store;

pub use memory_store::{MemoryStore, NoopEvents};
