// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Default)]
#[command(name = "response-rates-api")]
#[command(about = "Read-only HTTP API over census self-response rates")]
#[command(version)]
pub struct Args {
    /// YAML config file (defaults to /etc/response-rates/config.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen port, overrides the config file and RR_PORT
    #[arg(short, long)]
    pub port: Option<u16>,
}
