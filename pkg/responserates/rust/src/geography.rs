// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Existence checks for STATE, COUNTY and TRACT selectors.
//!
//! The hierarchy is strict: a county id is only looked up within one state
//! and a tract id within one (state, county) pair. Nothing here validates a
//! county or tract id on its own.

use async_trait::async_trait;
use log::error;

use crate::columns::Granularity;
use crate::errors::{Rejection, StoreError};
use crate::store::{QueryExecutor, SqlQuery, SqlValue, Value};

/// Distinct geography keys present in the dataset.
#[async_trait]
pub trait GeographyIndex: Send + Sync {
    async fn state_codes(&self) -> Result<Vec<String>, StoreError>;

    async fn county_ids(&self, state: &str) -> Result<Vec<i64>, StoreError>;

    async fn tract_ids(&self, state: &str, county: i64) -> Result<Vec<i64>, StoreError>;
}

/// [`GeographyIndex`] answered by distinct-value queries on the backing store.
pub struct StoreGeography<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> StoreGeography<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    async fn distinct(&self, query: SqlQuery) -> Result<Vec<Value>, StoreError> {
        let rows = self.executor.execute(&query).await?;
        Ok(rows
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }
}

#[async_trait]
impl GeographyIndex for StoreGeography<'_> {
    async fn state_codes(&self) -> Result<Vec<String>, StoreError> {
        let query = SqlQuery::new(
            format!(
                "SELECT DISTINCT state_short FROM {}",
                Granularity::State.table()
            ),
            vec![],
        );
        Ok(self
            .distinct(query)
            .await?
            .into_iter()
            .filter_map(|value| value.as_text().map(str::to_string))
            .collect())
    }

    async fn county_ids(&self, state: &str) -> Result<Vec<i64>, StoreError> {
        let query = SqlQuery::new(
            format!(
                "SELECT DISTINCT CAST(county AS INTEGER) FROM {} WHERE state_short = ?",
                Granularity::County.table()
            ),
            vec![SqlValue::Text(state.to_string())],
        );
        Ok(self
            .distinct(query)
            .await?
            .iter()
            .filter_map(Value::as_i64)
            .collect())
    }

    async fn tract_ids(&self, state: &str, county: i64) -> Result<Vec<i64>, StoreError> {
        let query = SqlQuery::new(
            format!(
                "SELECT DISTINCT CAST(tract AS INTEGER) FROM {} \
                 WHERE state_short = ? AND CAST(county AS INTEGER) = ?",
                Granularity::Tract.table()
            ),
            vec![SqlValue::Text(state.to_string()), SqlValue::Integer(county)],
        );
        Ok(self
            .distinct(query)
            .await?
            .iter()
            .filter_map(Value::as_i64)
            .collect())
    }
}

/// Every code must be a known state.
pub async fn check_states(
    index: &dyn GeographyIndex,
    states: &[String],
) -> Result<(), Rejection> {
    let known = index.state_codes().await.map_err(lookup_failed)?;
    if states.iter().all(|state| known.contains(state)) {
        Ok(())
    } else {
        Err(Rejection::InvalidState)
    }
}

/// Every id must be a county of `state`.
pub async fn check_counties(
    index: &dyn GeographyIndex,
    state: &str,
    counties: &[i64],
) -> Result<(), Rejection> {
    let known = index.county_ids(state).await.map_err(lookup_failed)?;
    if counties.iter().all(|county| known.contains(county)) {
        Ok(())
    } else {
        Err(Rejection::InvalidCounty)
    }
}

/// Every id must be a tract of `county` in `state`.
pub async fn check_tracts(
    index: &dyn GeographyIndex,
    state: &str,
    county: i64,
    tracts: &[i64],
) -> Result<(), Rejection> {
    let known = index.tract_ids(state, county).await.map_err(lookup_failed)?;
    if tracts.iter().all(|tract| known.contains(tract)) {
        Ok(())
    } else {
        Err(Rejection::InvalidTract)
    }
}

fn lookup_failed(e: StoreError) -> Rejection {
    error!("geography lookup failed: {e}");
    Rejection::Unavailable
}
