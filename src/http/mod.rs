//! HTTP request descriptions and the transport that sends them.

mod client;
mod error;
mod request;

#[cfg(test)]
pub use client::MockTransport;
pub use client::{ReqwestTransport, Response, Transport, USER_AGENT};
pub use error::HttpError;
pub use request::{Method, Request, RequestOptions, combine_url, query_pairs};
