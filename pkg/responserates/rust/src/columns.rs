// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Typed whitelist of everything that may appear in generated SQL: the three
//! geographic granularities, the response-rate metrics and the selectable
//! columns. SQL text is only ever built from these enumerations.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    State,
    County,
    Tract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Cumulative response rate, all modes.
    CrrAll,
    /// Cumulative response rate, internet.
    CrrInt,
    DAvg,
    DIntAvg,
    /// Daily response rate, all modes.
    DrrAll,
    /// Daily response rate, internet.
    DrrInt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    RespDate,
    GeoId,
    Metric(Metric),
    State,
    StateName,
    StateShort,
    County,
    CountyName,
    Tract,
}

const ALL_METRICS: &[Metric] = &[
    Metric::CrrAll,
    Metric::CrrInt,
    Metric::DAvg,
    Metric::DIntAvg,
    Metric::DrrAll,
    Metric::DrrInt,
];

// DAVG and DINTAVG are not published below county level.
const TRACT_METRICS: &[Metric] = &[
    Metric::CrrAll,
    Metric::CrrInt,
    Metric::DrrAll,
    Metric::DrrInt,
];

const STATE_GEO_COLUMNS: &[Column] = &[Column::State, Column::StateName, Column::StateShort];

const COUNTY_GEO_COLUMNS: &[Column] = &[
    Column::State,
    Column::StateName,
    Column::StateShort,
    Column::County,
    Column::CountyName,
];

const TRACT_GEO_COLUMNS: &[Column] = &[
    Column::State,
    Column::StateName,
    Column::StateShort,
    Column::County,
    Column::CountyName,
    Column::Tract,
];

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::State, Granularity::County, Granularity::Tract];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::State => "state",
            Granularity::County => "county",
            Granularity::Tract => "tract",
        }
    }

    /// Backing table (or view) holding the records for this level.
    pub fn table(self) -> &'static str {
        match self {
            Granularity::State => "state_response_rates",
            Granularity::County => "county_response_rates",
            Granularity::Tract => "tract_response_rates",
        }
    }

    pub fn metrics(self) -> &'static [Metric] {
        match self {
            Granularity::State | Granularity::County => ALL_METRICS,
            Granularity::Tract => TRACT_METRICS,
        }
    }

    pub fn allows(self, metric: Metric) -> bool {
        self.metrics().contains(&metric)
    }

    /// Geography descriptor columns appended after the metrics.
    pub fn geo_columns(self) -> &'static [Column] {
        match self {
            Granularity::State => STATE_GEO_COLUMNS,
            Granularity::County => COUNTY_GEO_COLUMNS,
            Granularity::Tract => TRACT_GEO_COLUMNS,
        }
    }

    /// Ascending tie-break keys applied after `RESP_DATE DESC`.
    pub fn order_keys(self) -> &'static [Column] {
        match self {
            Granularity::State => &[Column::StateShort],
            Granularity::County => &[Column::StateShort, Column::CountyName],
            Granularity::Tract => &[Column::StateShort, Column::CountyName, Column::Tract],
        }
    }

    /// Column identifying one plotted line in a chart.
    pub fn entity_column(self) -> Column {
        match self {
            Granularity::State => Column::StateShort,
            Granularity::County => Column::County,
            Granularity::Tract => Column::Tract,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Granularity::State => "State",
            Granularity::County => "County",
            Granularity::Tract => "Tract",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "state" => Ok(Granularity::State),
            "county" => Ok(Granularity::County),
            "tract" => Ok(Granularity::Tract),
            _ => Err(()),
        }
    }
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::CrrAll => "CRRALL",
            Metric::CrrInt => "CRRINT",
            Metric::DAvg => "DAVG",
            Metric::DIntAvg => "DINTAVG",
            Metric::DrrAll => "DRRALL",
            Metric::DrrInt => "DRRINT",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_METRICS
            .iter()
            .copied()
            .find(|metric| metric.as_str() == s)
            .ok_or(())
    }
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::RespDate => "RESP_DATE",
            Column::GeoId => "GEO_ID",
            Column::Metric(metric) => metric.as_str(),
            Column::State => "state",
            Column::StateName => "state_name",
            Column::StateShort => "state_short",
            Column::County => "county",
            Column::CountyName => "county_name",
            Column::Tract => "tract",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
