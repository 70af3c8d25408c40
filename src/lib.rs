//! # blink-wallet
//!
//! Backend for the Blink Wallet mini-app: republishes market prices merged
//! with fixed local-asset prices, and keeps a per-user balance ledger with
//! peer-to-peer transfers addressed by tag.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, cookie sessions)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── RateStore ◄── RateFetcher (background, CoinGecko)
//!     ├── AccountService / LedgerStore / TransferEngine (service/)
//!     │
//!     ├── Repository traits (persistence/)
//!     │     ├── PostgreSQL (sqlx)
//!     │     └── in-memory
//!     └── Rate file (JSON, atomic replace)
//! ```
//!
//! Without a relational store the rate pipeline keeps running on the file
//! tier alone and every account endpoint answers 503.

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
