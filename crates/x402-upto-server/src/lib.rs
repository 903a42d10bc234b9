//! Resource server middleware — gates HTTP endpoints behind metered upto
//! payments.
//!
//! Routes advertise a ceiling price in a 402 challenge. On a paid request
//! the gate verifies the authorization with the facilitator, lets the
//! handler run, meters what the response actually consumed, and settles
//! only that amount. Settlement never blocks or fails the client response.
//!
//! # Modules
//!
//! - [`config`] — route registration and pricing ([`PaymentConfigBuilder`](config::PaymentConfigBuilder))
//! - [`meter`] — consumption metering ([`Meter`](meter::Meter))
//! - [`middleware`] — the verify/handle/meter/settle sequencer
//! - [`metrics`] — Prometheus counters for requests and settlements

pub mod config;
pub mod meter;
pub mod metrics;
pub mod middleware;
pub mod routes;

pub use config::{PaymentConfig, PaymentConfigBuilder, PaymentGateConfig, RoutePaymentConfig};
pub use meter::{FullAmountMeter, Meter, MeterContext, TextTokenMeter};
pub use middleware::{payment_required_body, respond_paid, verify_payment, VerifiedPayment};
