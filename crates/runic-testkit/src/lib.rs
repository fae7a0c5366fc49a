//! Runic Testing Infrastructure
//!
//! A scripted stand-in for the load-balancing client plus fixtures shared by
//! the controller's integration suites.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! runic-testkit = { workspace = true }
//! ```
//!
//! ```rust,no_run
//! use runic_app::AppCore;
//! use runic_testkit::{config_with_demo_wallets, MockRpcClient};
//!
//! let client = MockRpcClient::new();
//! let core = AppCore::new(config_with_demo_wallets(2), client.shared()).unwrap();
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod mock_client;

pub use fixtures::*;
pub use mock_client::{MockRpcClient, RequestRecord};
