// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::RenderError;
use crate::store::ResultSet;

/// Header row of column names, then each row verbatim. NULL becomes an empty field.
pub fn to_csv(rows: &ResultSet) -> Result<Vec<u8>, RenderError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&rows.columns)?;
    for row in &rows.rows {
        writer.write_record(row.iter().map(|value| value.to_field()))?;
    }
    writer
        .into_inner()
        .map_err(|e| RenderError::Csv(csv::Error::from(e.into_error())))
}
