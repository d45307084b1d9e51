// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

mod chart;
mod csv;
mod json;

pub use self::chart::{ChartRenderer, LineChart, PlottersRenderer, Series, build_line_chart};
pub use self::csv::to_csv;
pub use self::json::to_json;

use crate::columns::Granularity;
use crate::errors::RenderError;
use crate::params::Format;
use crate::store::ResultSet;
use crate::validate::ValidatedRequest;

/// A response body ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: &'static str,
    /// Set when the body is delivered as a file attachment.
    pub filename: Option<String>,
    pub body: Vec<u8>,
}

pub fn render(
    granularity: Granularity,
    request: &ValidatedRequest,
    rows: &ResultSet,
    charts: &dyn ChartRenderer,
) -> Result<Rendered, RenderError> {
    match request.format {
        Format::Json => Ok(Rendered {
            content_type: "application/json",
            filename: None,
            body: to_json(rows)?,
        }),
        Format::Csv => Ok(Rendered {
            content_type: "text/csv",
            filename: Some(format!("{granularity}_response_rates.csv")),
            body: to_csv(rows)?,
        }),
        Format::Png => {
            let chart = build_line_chart(granularity, request, rows)?;
            Ok(Rendered {
                content_type: "image/png",
                filename: None,
                body: charts.render(&chart)?,
            })
        }
    }
}
