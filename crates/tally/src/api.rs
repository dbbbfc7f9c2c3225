//! The assistants / threads / runs HTTP API served by `tallyd`
//!
//! `types` holds the records and request bodies shared by the server and
//! [`client::ApiClient`].
pub mod client;
pub mod types;
