//! Fixed-capacity connection pool for binrpc clients.
//!
//! A [`Pool`] dials all of its connections up front and hands them out one at
//! a time as [`PooledConn`] guards. A connection that died while idle is
//! redialed when it is next checked out; callers never see more than
//! `capacity` connections open at once.

pub mod error;
pub mod pool;

pub use error::{PoolError, Result};
pub use pool::{Pool, PooledConn};
