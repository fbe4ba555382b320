#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `session` owns the boundary between the transfer pipeline and the remote
//! file server. The pipeline only ever sees two things from this crate: the
//! [`Endpoint`] trait, the primitive remote-file capability (list, rename,
//! open, stat) every transfer step is built from, and the
//! [`SessionProvider`], which leases pooled connections keyed by schema
//! name.
//!
//! # Design
//!
//! - [`Endpoint`] is deliberately primitive: atomic rename plus streamed
//!   reads and writes are the only building blocks the pipeline may assume.
//!   No locking, no copy-on-write, no transactions.
//! - [`LocalEndpoint`] implements the trait against a rooted local
//!   directory. It backs file-to-file rules and doubles as the test
//!   endpoint, so the full pipeline can run against a tempdir.
//! - The `sftp` feature adds [`SftpEndpoint`], a blocking libssh2-backed
//!   implementation built from a [`rules::Connection`] profile.
//! - [`SessionProvider`] maintains one bounded pool per schema. Borrowing
//!   returns a [`SessionHandle`] that releases its session back to the pool
//!   on drop; callers that detect a broken session call
//!   [`SessionHandle::evict`] instead so the connection is discarded rather
//!   than recycled.
//!
//! # Invariants
//!
//! - Every borrow is matched by exactly one release (drop) or eviction.
//! - A pool never holds more than its configured number of live sessions;
//!   borrows beyond that wait, and waiting beyond the configured timeout
//!   fails with [`SessionError::PoolExhausted`].
//! - With test-on-borrow enabled, a session is probed before being handed
//!   out; a session that fails its probe is evicted and the borrow retries
//!   with another (or a freshly connected) session.

mod endpoint;
mod error;
mod local;
mod provider;
#[cfg(feature = "sftp")]
mod sftp;

pub use endpoint::Endpoint;
pub use error::{EndpointError, SessionError};
pub use local::LocalEndpoint;
pub use provider::{PoolConfig, SessionFactory, SessionHandle, SessionProvider};
#[cfg(feature = "sftp")]
pub use sftp::{SftpEndpoint, SftpSessionFactory};
