// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Request validation.
//!
//! Rules run in a fixed order and the first failure is the one reported:
//! FORMAT, then FROM/TO, then DATA, then STATE, COUNTY and TRACT. Geographic
//! selectors are checked against the dataset itself, each scoped to the
//! already-validated parent.

use time::Date;

use crate::columns::{Granularity, Metric};
use crate::dates::parse_date;
use crate::errors::Rejection;
use crate::geography::{GeographyIndex, check_counties, check_states, check_tracts};
use crate::params::{COUNTY, DATA, FORMAT, FROM, Format, RequestParams, STATE, TO, TRACT};

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Date,
    pub to: Date,
}

/// A request that passed every rule, with typed fields.
///
/// Selectors that do not apply to the granularity are always `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub format: Format,
    pub metrics: Option<Vec<Metric>>,
    pub dates: Option<DateRange>,
    pub states: Option<Vec<String>>,
    pub counties: Option<Vec<i64>>,
    pub tracts: Option<Vec<i64>>,
    /// COUNTY tokens as the client wrote them, parallel to `counties`. Used for legends.
    pub county_tokens: Option<Vec<String>>,
    /// TRACT tokens as the client wrote them, parallel to `tracts`.
    pub tract_tokens: Option<Vec<String>>,
}

impl ValidatedRequest {
    /// The single metric a chart plots.
    pub fn chart_metric(&self) -> Option<Metric> {
        match self.metrics.as_deref() {
            Some([metric]) => Some(*metric),
            _ => None,
        }
    }
}

pub async fn validate_request(
    granularity: Granularity,
    params: &RequestParams,
    geography: &dyn GeographyIndex,
) -> Result<ValidatedRequest, Rejection> {
    let format = validate_format(params)?;
    let dates = validate_dates(params)?;
    let metrics = validate_data(granularity, format, params)?;

    let png = format == Format::Png;
    let (states, counties, tracts) = match granularity {
        Granularity::State => {
            let states = validate_states(granularity, params, png, geography).await?;
            (states, None, None)
        }
        Granularity::County => {
            let states =
                validate_states(granularity, params, params.contains(COUNTY), geography).await?;
            let counties =
                validate_counties(granularity, params, states.as_deref(), png, geography).await?;
            (states, counties, None)
        }
        Granularity::Tract => {
            let states = validate_states(granularity, params, true, geography).await?;
            let counties = validate_counties(
                granularity,
                params,
                states.as_deref(),
                params.contains(TRACT),
                geography,
            )
            .await?;
            let tracts = validate_tracts(
                params,
                states.as_deref(),
                counties.as_deref(),
                png,
                geography,
            )
            .await?;
            (states, counties, tracts)
        }
    };

    Ok(ValidatedRequest {
        format,
        metrics,
        dates,
        states,
        county_tokens: counties.is_some().then(|| tokens(params, COUNTY)),
        tract_tokens: tracts.is_some().then(|| tokens(params, TRACT)),
        counties,
        tracts,
    })
}

pub fn validate_format(params: &RequestParams) -> Result<Format, Rejection> {
    params
        .get(FORMAT)
        .and_then(|value| value.parse().ok())
        .ok_or(Rejection::InvalidFormat)
}

/// Both bounds or neither. Absent bounds mean an unbounded range.
pub fn validate_dates(params: &RequestParams) -> Result<Option<DateRange>, Rejection> {
    match (params.get(FROM), params.get(TO)) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => match (parse_date(from), parse_date(to)) {
            (Some(from), Some(to)) => Ok(Some(DateRange { from, to })),
            _ => Err(Rejection::InvalidDates),
        },
        _ => Err(Rejection::InvalidDates),
    }
}

/// DATA may be omitted except for charts, which plot exactly one metric.
pub fn validate_data(
    granularity: Granularity,
    format: Format,
    params: &RequestParams,
) -> Result<Option<Vec<Metric>>, Rejection> {
    let Some(tokens) = params.list(DATA) else {
        return if format == Format::Png {
            Err(Rejection::InvalidData)
        } else {
            Ok(None)
        };
    };

    if format == Format::Png && tokens.len() > 1 {
        return Err(Rejection::InvalidData);
    }

    let mut metrics: Vec<Metric> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let metric: Metric = token.parse().map_err(|_| Rejection::InvalidData)?;
        if !granularity.allows(metric) {
            return Err(Rejection::InvalidData);
        }
        if !metrics.contains(&metric) {
            metrics.push(metric);
        }
    }
    Ok(Some(metrics))
}

async fn validate_states(
    granularity: Granularity,
    params: &RequestParams,
    required: bool,
    geography: &dyn GeographyIndex,
) -> Result<Option<Vec<String>>, Rejection> {
    let Some(tokens) = params.list(STATE) else {
        return if required {
            Err(Rejection::InvalidState)
        } else {
            Ok(None)
        };
    };

    // Only the state level lists several states at once.
    if granularity != Granularity::State && tokens.len() > 1 {
        return Err(Rejection::InvalidState);
    }

    let states: Vec<String> = tokens.into_iter().map(str::to_string).collect();
    check_states(geography, &states).await?;
    Ok(Some(states))
}

async fn validate_counties(
    granularity: Granularity,
    params: &RequestParams,
    states: Option<&[String]>,
    required: bool,
    geography: &dyn GeographyIndex,
) -> Result<Option<Vec<i64>>, Rejection> {
    let Some(tokens) = params.list(COUNTY) else {
        return if required {
            Err(Rejection::InvalidCounty)
        } else {
            Ok(None)
        };
    };

    if granularity != Granularity::County && tokens.len() > 1 {
        return Err(Rejection::InvalidCounty);
    }

    // A county id is meaningless without the state it belongs to.
    let Some([state]) = states else {
        return Err(Rejection::InvalidCounty);
    };

    let counties = parse_ids(&tokens).ok_or(Rejection::InvalidCounty)?;
    check_counties(geography, state, &counties).await?;
    Ok(Some(counties))
}

async fn validate_tracts(
    params: &RequestParams,
    states: Option<&[String]>,
    counties: Option<&[i64]>,
    required: bool,
    geography: &dyn GeographyIndex,
) -> Result<Option<Vec<i64>>, Rejection> {
    let Some(tokens) = params.list(TRACT) else {
        return if required {
            Err(Rejection::InvalidTract)
        } else {
            Ok(None)
        };
    };

    let (Some([state]), Some([county])) = (states, counties) else {
        return Err(Rejection::InvalidTract);
    };

    let tracts = parse_ids(&tokens).ok_or(Rejection::InvalidTract)?;
    check_tracts(geography, state, *county, &tracts).await?;
    Ok(Some(tracts))
}

fn tokens(params: &RequestParams, key: &str) -> Vec<String> {
    params
        .list(key)
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn parse_ids(tokens: &[&str]) -> Option<Vec<i64>> {
    tokens.iter().map(|token| token.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::tests::FakeGeography;
    use time::macros::date;

    async fn validate(
        granularity: Granularity,
        query: &str,
    ) -> Result<ValidatedRequest, Rejection> {
        let params = RequestParams::from_query(Some(query));
        validate_request(granularity, &params, &FakeGeography::sample()).await
    }

    #[tokio::test]
    async fn test_missing_format_rejected_at_every_level() {
        for granularity in Granularity::ALL {
            assert_eq!(
                validate(granularity, "STATE=CA").await,
                Err(Rejection::InvalidFormat)
            );
            assert_eq!(
                validate(granularity, "FORMAT=XML").await,
                Err(Rejection::InvalidFormat)
            );
            assert_eq!(
                validate(granularity, "FORMAT=json").await,
                Err(Rejection::InvalidFormat)
            );
        }
    }

    #[tokio::test]
    async fn test_minimal_requests() {
        let request = validate(Granularity::State, "FORMAT=JSON").await.unwrap();
        assert_eq!(
            request,
            ValidatedRequest {
                format: Format::Json,
                metrics: None,
                dates: None,
                states: None,
                counties: None,
                tracts: None,
                county_tokens: None,
                tract_tokens: None,
            }
        );
        assert!(validate(Granularity::County, "FORMAT=CSV").await.is_ok());
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=CSV").await,
            Err(Rejection::InvalidState)
        );
    }

    #[tokio::test]
    async fn test_id_tokens_kept_as_written() {
        let request = validate(Granularity::County, "FORMAT=JSON&STATE=CA&COUNTY=001,3")
            .await
            .unwrap();
        assert_eq!(request.counties, Some(vec![1, 3]));
        assert_eq!(
            request.county_tokens,
            Some(vec!["001".to_string(), "3".to_string()])
        );
        assert_eq!(request.tract_tokens, None);
    }

    #[tokio::test]
    async fn test_dates_need_both_bounds() {
        assert_eq!(
            validate(Granularity::State, "FORMAT=JSON&FROM=2020-01-01").await,
            Err(Rejection::InvalidDates)
        );
        assert_eq!(
            validate(Granularity::State, "FORMAT=JSON&TO=2020-01-01").await,
            Err(Rejection::InvalidDates)
        );
        let request = validate(Granularity::State, "FORMAT=JSON&FROM=2023-02-01&TO=2023-02-28")
            .await
            .unwrap();
        assert_eq!(
            request.dates,
            Some(DateRange {
                from: date!(2023 - 02 - 01),
                to: date!(2023 - 02 - 28),
            })
        );
    }

    #[tokio::test]
    async fn test_impossible_dates_rejected() {
        assert_eq!(
            validate(Granularity::State, "FORMAT=JSON&FROM=2023-02-01&TO=2023-02-30").await,
            Err(Rejection::InvalidDates)
        );
        assert_eq!(
            validate(Granularity::State, "FORMAT=JSON&FROM=2023-13-01&TO=2023-12-30").await,
            Err(Rejection::InvalidDates)
        );
    }

    #[tokio::test]
    async fn test_dates_checked_before_data() {
        assert_eq!(
            validate(Granularity::State, "FORMAT=JSON&FROM=bad&TO=bad&DATA=NOPE").await,
            Err(Rejection::InvalidDates)
        );
    }

    #[tokio::test]
    async fn test_every_allowed_metric_accepted() {
        for granularity in Granularity::ALL {
            let all: Vec<&str> = granularity.metrics().iter().map(|m| m.as_str()).collect();
            for metric in &all {
                let query = format!("FORMAT=JSON&STATE=CA&DATA={metric}");
                assert!(validate(granularity, &query).await.is_ok(), "{granularity} {metric}");
            }
            let query = format!("FORMAT=CSV&STATE=CA&DATA={}", all.join(","));
            let request = validate(granularity, &query).await.unwrap();
            assert_eq!(request.metrics.as_deref(), Some(granularity.metrics()));
        }
    }

    #[tokio::test]
    async fn test_unknown_metric_rejected() {
        for granularity in Granularity::ALL {
            for data in ["GEO_ID", "crrall", "", "CRRALL,NOPE"] {
                let query = format!("FORMAT=JSON&STATE=CA&DATA={data}");
                assert_eq!(
                    validate(granularity, &query).await,
                    Err(Rejection::InvalidData),
                    "{granularity} {data}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_tract_rejects_daily_averages() {
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=JSON&STATE=CA&DATA=DAVG").await,
            Err(Rejection::InvalidData)
        );
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=JSON&STATE=CA&DATA=CRRALL,DINTAVG").await,
            Err(Rejection::InvalidData)
        );
    }

    #[tokio::test]
    async fn test_repeated_metric_collapsed() {
        let request = validate(Granularity::State, "FORMAT=JSON&DATA=CRRALL,CRRINT,CRRALL")
            .await
            .unwrap();
        assert_eq!(request.metrics, Some(vec![Metric::CrrAll, Metric::CrrInt]));
    }

    #[tokio::test]
    async fn test_png_needs_exactly_one_metric() {
        assert_eq!(
            validate(Granularity::State, "FORMAT=PNG&STATE=CA").await,
            Err(Rejection::InvalidData)
        );
        assert_eq!(
            validate(Granularity::State, "FORMAT=PNG&STATE=CA&DATA=CRRALL,CRRINT").await,
            Err(Rejection::InvalidData)
        );
        let request = validate(Granularity::State, "FORMAT=PNG&STATE=CA&DATA=CRRALL")
            .await
            .unwrap();
        assert_eq!(request.chart_metric(), Some(Metric::CrrAll));
    }

    #[tokio::test]
    async fn test_state_level_states() {
        let request = validate(Granularity::State, "FORMAT=JSON&STATE=CA,NY").await.unwrap();
        assert_eq!(request.states, Some(vec!["CA".to_string(), "NY".to_string()]));
        assert_eq!(
            validate(Granularity::State, "FORMAT=JSON&STATE=CA,ZZ").await,
            Err(Rejection::InvalidState)
        );
        assert_eq!(
            validate(Granularity::State, "FORMAT=PNG&DATA=CRRALL").await,
            Err(Rejection::InvalidState)
        );
    }

    #[tokio::test]
    async fn test_state_level_ignores_lower_selectors() {
        let request = validate(Granularity::State, "FORMAT=JSON&COUNTY=999&TRACT=abc")
            .await
            .unwrap();
        assert_eq!(request.counties, None);
        assert_eq!(request.tracts, None);
    }

    #[tokio::test]
    async fn test_county_level_single_state() {
        assert_eq!(
            validate(Granularity::County, "FORMAT=JSON&STATE=CA,NY").await,
            Err(Rejection::InvalidState)
        );
        assert!(validate(Granularity::County, "FORMAT=JSON&STATE=CA").await.is_ok());
    }

    #[tokio::test]
    async fn test_county_requires_state() {
        assert_eq!(
            validate(Granularity::County, "FORMAT=JSON&COUNTY=1").await,
            Err(Rejection::InvalidState)
        );
    }

    #[tokio::test]
    async fn test_county_scoped_to_state() {
        let request = validate(Granularity::County, "FORMAT=JSON&STATE=CA&COUNTY=1,3")
            .await
            .unwrap();
        assert_eq!(request.counties, Some(vec![1, 3]));
        assert_eq!(
            validate(Granularity::County, "FORMAT=JSON&STATE=NY&COUNTY=1").await,
            Err(Rejection::InvalidCounty)
        );
        assert_eq!(
            validate(Granularity::County, "FORMAT=JSON&STATE=CA&COUNTY=one").await,
            Err(Rejection::InvalidCounty)
        );
    }

    #[tokio::test]
    async fn test_county_png_requires_county() {
        assert_eq!(
            validate(Granularity::County, "FORMAT=PNG&STATE=CA&DATA=CRRALL").await,
            Err(Rejection::InvalidCounty)
        );
        assert!(
            validate(Granularity::County, "FORMAT=PNG&STATE=CA&COUNTY=1,3&DATA=CRRALL")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_tract_level_rules() {
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=JSON&TRACT=100").await,
            Err(Rejection::InvalidState)
        );
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=JSON&STATE=CA&TRACT=100").await,
            Err(Rejection::InvalidCounty)
        );
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=JSON&STATE=CA&COUNTY=1,3").await,
            Err(Rejection::InvalidCounty)
        );
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=JSON&STATE=CA&COUNTY=1&TRACT=300").await,
            Err(Rejection::InvalidTract)
        );
        let request = validate(Granularity::Tract, "FORMAT=JSON&STATE=CA&COUNTY=1&TRACT=100,101")
            .await
            .unwrap();
        assert_eq!(request.states, Some(vec!["CA".to_string()]));
        assert_eq!(request.counties, Some(vec![1]));
        assert_eq!(request.tracts, Some(vec![100, 101]));
    }

    #[tokio::test]
    async fn test_tract_png_requires_tract() {
        assert_eq!(
            validate(Granularity::Tract, "FORMAT=PNG&STATE=CA&COUNTY=1&DATA=CRRALL").await,
            Err(Rejection::InvalidTract)
        );
        assert!(
            validate(Granularity::Tract, "FORMAT=PNG&STATE=CA&COUNTY=1&TRACT=100&DATA=CRRALL")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_generic() {
        let params = RequestParams::from_query(Some("FORMAT=JSON&STATE=CA"));
        let result = validate_request(Granularity::State, &params, &FakeGeography::broken()).await;
        assert_eq!(result, Err(Rejection::Unavailable));
        assert_eq!(Rejection::Unavailable.to_string(), "Bad request");
    }

    #[tokio::test]
    async fn test_no_lookup_without_geographic_selectors() {
        let params = RequestParams::from_query(Some("FORMAT=JSON&DATA=CRRALL"));
        let result = validate_request(Granularity::County, &params, &FakeGeography::broken()).await;
        assert!(result.is_ok());
    }
}
