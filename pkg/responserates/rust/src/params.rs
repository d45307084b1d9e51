// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::debug;

pub const FORMAT: &str = "FORMAT";
pub const DATA: &str = "DATA";
pub const STATE: &str = "STATE";
pub const COUNTY: &str = "COUNTY";
pub const TRACT: &str = "TRACT";
pub const FROM: &str = "FROM";
pub const TO: &str = "TO";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Csv,
    Png,
}

impl FromStr for Format {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JSON" => Ok(Format::Json),
            "CSV" => Ok(Format::Csv),
            "PNG" => Ok(Format::Png),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => write!(f, "JSON"),
            Format::Csv => write!(f, "CSV"),
            Format::Png => write!(f, "PNG"),
        }
    }
}

/// Raw, not-yet-validated query-string fields of one request.
///
/// Keys are case-sensitive. When a key is repeated the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    values: HashMap<String, String>,
}

impl RequestParams {
    pub fn from_query(query: Option<&str>) -> Self {
        let mut values = HashMap::new();
        let Some(query) = query else {
            return Self { values };
        };

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Some(key), Some(value)) = (decode(key), decode(value)) else {
                debug!("dropping undecodable query pair: {pair}");
                continue;
            };
            values.entry(key).or_insert(value);
        }

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Comma-separated tokens of `key`, untrimmed. `None` when the key is absent.
    pub fn list(&self, key: &str) -> Option<Vec<&str>> {
        self.get(key).map(|value| value.split(',').collect())
    }
}

fn decode(raw: &str) -> Option<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}
