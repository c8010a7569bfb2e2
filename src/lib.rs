//! # PostgreSQL Secret Rotator
//!
//! Single-user password rotation for PostgreSQL credentials held in AWS Secrets Manager.
//!
//! ## Overview
//!
//! Secrets Manager drives rotation by invoking the handler four times per
//! rotation, once per step, with the same client request token:
//!
//! 1. **createSecret** - stage a new version (`AWSPENDING`) with a freshly generated password
//! 2. **setSecret** - change the database user's password to the pending one
//! 3. **testSecret** - log in with the pending credential and run a query
//! 4. **finishSecret** - move `AWSCURRENT` to the pending version
//!
//! Any step may be retried. Each one detects when its work is already done and
//! returns without side effects.
//!
//! ## Modules
//!
//! - `config`: environment-sourced handler settings
//! - `secret`: secret JSON schema and TLS policy
//! - `provider`: secret store contract and the Secrets Manager client
//! - `database`: connection fallback and the PostgreSQL session
//! - `password`: password generation requests
//! - `rotation`: the step state machine
//! - `observability`: tracing subscriber setup

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod observability;
pub mod password;
pub mod provider;
pub mod rotation;
pub mod secret;

pub use config::RotationConfig;
pub use error::RotationError;
pub use rotation::{RotationEvent, RotationStep, Rotator, StepOutcome};
