// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Translation of a validated request into a filtered, ordered selection.
//!
//! [`build_query`] is pure: the same granularity and request always produce
//! the same [`QuerySpec`], and the same query spec always renders to the same SQL
//! text and parameter list.

use crate::columns::{Column, Granularity};
use crate::dates::format_date;
use crate::store::{SqlQuery, SqlValue};
use crate::validate::{DateRange, ValidatedRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `RESP_DATE BETWEEN from AND to`, both ends inclusive.
    DateRange(DateRange),
    States(Vec<String>),
    /// Compared numerically; ids are stored as text.
    Counties(Vec<i64>),
    Tracts(Vec<i64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub granularity: Granularity,
    pub columns: Vec<Column>,
    pub filters: Vec<Filter>,
}

pub fn build_query(granularity: Granularity, request: &ValidatedRequest) -> QuerySpec {
    let mut columns = vec![Column::RespDate, Column::GeoId];
    match &request.metrics {
        Some(metrics) => columns.extend(metrics.iter().copied().map(Column::Metric)),
        None => columns.extend(granularity.metrics().iter().copied().map(Column::Metric)),
    }
    columns.extend_from_slice(granularity.geo_columns());

    let mut filters = Vec::new();
    if let Some(range) = request.dates {
        filters.push(Filter::DateRange(range));
    }
    if let Some(states) = &request.states {
        filters.push(Filter::States(states.clone()));
    }
    if granularity != Granularity::State
        && let Some(counties) = &request.counties
    {
        filters.push(Filter::Counties(counties.clone()));
    }
    if granularity == Granularity::Tract
        && let Some(tracts) = &request.tracts
    {
        filters.push(Filter::Tracts(tracts.clone()));
    }

    QuerySpec {
        granularity,
        columns,
        filters,
    }
}

impl QuerySpec {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name()).collect()
    }

    pub fn to_sql(&self) -> SqlQuery {
        let mut params = Vec::new();
        let mut predicates = vec![format!("{} IS NOT NULL", Column::RespDate)];

        for filter in &self.filters {
            match filter {
                Filter::DateRange(range) => {
                    predicates.push(format!("{} BETWEEN ? AND ?", Column::RespDate));
                    params.push(SqlValue::Text(format_date(range.from)));
                    params.push(SqlValue::Text(format_date(range.to)));
                }
                Filter::States(states) => {
                    predicates.push(format!(
                        "{} IN ({})",
                        Column::StateShort,
                        placeholders(states.len())
                    ));
                    params.extend(states.iter().cloned().map(SqlValue::Text));
                }
                Filter::Counties(counties) => {
                    predicates.push(format!(
                        "CAST({} AS INTEGER) IN ({})",
                        Column::County,
                        placeholders(counties.len())
                    ));
                    params.extend(counties.iter().copied().map(SqlValue::Integer));
                }
                Filter::Tracts(tracts) => {
                    predicates.push(format!(
                        "CAST({} AS INTEGER) IN ({})",
                        Column::Tract,
                        placeholders(tracts.len())
                    ));
                    params.extend(tracts.iter().copied().map(SqlValue::Integer));
                }
            }
        }

        let order: Vec<String> = std::iter::once(format!("{} DESC", Column::RespDate))
            .chain(self.granularity.order_keys().iter().map(Column::to_string))
            .collect();

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {}",
            self.column_names().join(", "),
            self.granularity.table(),
            predicates.join(" AND "),
            order.join(", "),
        );
        SqlQuery::new(sql, params)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
