//! upto facilitator — verifies Permit2 ceiling authorizations and settles
//! the metered amount on-chain via the upto proxy.
//!
//! Resource servers call `/verify` before running a handler and `/settle`
//! after metering. Every verified authorization is recorded in a SQLite
//! audit store together with its eventual disposition; `/stats` aggregates
//! how much the metered scheme saved payers against their signed ceilings.
//!
//! # Modules
//!
//! - [`routes`] — HTTP endpoints (`/verify`, `/settle`, `/supported`, `/stats`, `/`, `/metrics`)
//! - [`state`] — shared [`AppState`](state::AppState)
//! - [`audit`] — SQLite payment audit store
//! - [`metrics`] — Prometheus metrics for verify/settle operations

pub mod audit;
pub mod metrics;
pub mod routes;
pub mod state;
