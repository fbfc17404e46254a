//! `orderapi` crate: client for the remote order-search API.
//!
//! [`AuthProvider`] exchanges client credentials for a bearer token and
//! caches it; [`QueryClient`] runs paginated searches with that token. Both
//! sit behind the [`TokenSource`] / [`OrderSource`] traits so the pipeline
//! can be exercised against the doubles in [`mock`].

pub mod auth;
pub mod error;
pub mod http;
pub mod mock;
pub mod query;
pub mod traits;

pub use auth::AuthProvider;
pub use error::{AuthError, QueryError};
pub use http::{build_http_client, ApiConfig};
pub use query::QueryClient;
pub use traits::{AuthToken, OrderQuery, OrderSource, TokenSource};
