//! # Intake
//!
//! A content-addressed directory watcher that incrementally integrates new
//! files.
//!
//! Intake polls a watched folder, hashes every regular file, and integrates
//! the ones whose bytes it has never seen: text gets a pattern summary,
//! archives are unpacked into a scratch directory, anything else is recorded
//! as an opaque binary. The accumulated state is persisted as one JSON blob
//! and survives restarts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Watcher    │──▶│ Integrator  │──▶│ state.json │
//! │ tick/cancel │   │ scan+extract│   │ WatchState │
//! └─────────────┘   └──────┬──────┘   └────────────┘
//!                          │
//!             ┌────────────┼────────────┐
//!             ▼            ▼            ▼
//!        ┌────────┐   ┌─────────┐  ┌──────────┐
//!        │  CLI   │   │  shell  │  │ HTTP API │
//!        └────────┘   └─────────┘  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! intake scan                   # one pass over ./training_data
//! intake stats                  # what has been integrated
//! intake watch                  # poll every 60 seconds until Ctrl-C
//! intake serve                  # watch + HTTP status API
//! intake shell                  # watch + interactive commands
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scan`] | Directory walk and content hashing |
//! | [`extract`] | Per-category extraction |
//! | [`state`] | State persistence |
//! | [`integrator`] | Incremental integration passes |
//! | [`watcher`] | Cancellable periodic task |
//! | [`progress`] | Integration notifications |
//! | [`commands`] | Closed command set and dispatch table |
//! | [`shell`] | Interactive command loop |
//! | [`server`] | HTTP status API |
//! | [`stats`] | Stats report |
//! | [`error`] | Error types |

pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod integrator;
pub mod models;
pub mod progress;
pub mod scan;
pub mod server;
pub mod shell;
pub mod state;
pub mod stats;
pub mod watcher;
