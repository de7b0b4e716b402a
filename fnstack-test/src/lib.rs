//! Test utilities for fnstack
//!
//! Provides utilities for end-to-end testing of the runtime:
//! - Start an in-process server on a free port
//! - Client helpers for the init/invoke routes
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fnstack_test::TestServer;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_app() {
//!     let server = TestServer::with_sample().await.unwrap();
//!     let client = server.client();
//!
//!     client.init(Some("app.handler")).await.unwrap();
//!     let response = client.invoke(json!({ "name": "World" }), None).await.unwrap();
//!     assert_eq!(response.status, 200);
//! }
//! ```

pub mod client;
pub mod server;

pub use client::{ApiResponse, ClientError, FnStackClient};
pub use server::{TestError, TestServer};

/// Timeout for waiting on the server
pub const STARTUP_TIMEOUT_SECS: u64 = 5;
