// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

//! Read-only HTTP API over daily census self-response rates at state,
//! county and tract granularity.

pub mod cli;
pub mod columns;
pub mod config;
mod dates;
pub mod errors;
pub mod geography;
pub mod params;
pub mod query;
pub mod render;
pub mod server;
pub mod store;
pub mod validate;

pub use columns::{Granularity, Metric};
pub use errors::{ConfigError, Rejection, RenderError, StoreError};
pub use server::{AppState, handle_request, serve};
pub use store::{PoolSettings, QueryExecutor, SqlitePool};
