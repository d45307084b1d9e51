// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a request was turned away. The display text is what the client sees.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("Invalid FORMAT value")]
    InvalidFormat,
    #[error("Invalid dates format")]
    InvalidDates,
    #[error("Invalid DATA value")]
    InvalidData,
    #[error("Invalid STATE value")]
    InvalidState,
    #[error("Invalid COUNTY value")]
    InvalidCounty,
    #[error("Invalid TRACT value")]
    InvalidTract,
    /// The backing store failed; details are logged, never sent to the client.
    #[error("Bad request")]
    Unavailable,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("could not open database {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("could not build connection pool: {0}")]
    PoolBuild(#[source] r2d2::Error),
    #[error("timed out after {0:?} waiting for a database connection")]
    PoolTimeout(Duration),
    #[error("database worker failed: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("could not encode CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("result set has no {0} column")]
    MissingColumn(&'static str),
    #[error("chart needs exactly one metric and at least one entity")]
    ChartSelection,
    #[error("could not draw chart: {0}")]
    Chart(String),
    #[error("could not encode PNG: {0}")]
    Png(#[from] png::EncodingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}
