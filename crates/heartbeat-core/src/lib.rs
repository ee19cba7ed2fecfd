//! Core types and trait definitions for the Heartbeat match feed.
//!
//! This crate is free of HTTP and database dependencies. All other crates
//! depend on it.

// Native `async fn` in traits; the store traits spell out their `Send`
// bounds explicitly.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod decision;
pub mod error;
pub mod feed;
pub mod memory;
pub mod profile;
pub mod retry;
pub mod session;
pub mod store;

pub use error::{Error, Result};
