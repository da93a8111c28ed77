//! Traffic feed reader.
//!
//! The feed is a CSV with one row per counting location: a site id column, a
//! `POINT (lon lat)` geometry column and one count column per `{Day}_{Period}`
//! pair (e.g. `May07_AM`). The header is resolved once into a [`FeedSchema`];
//! rows that fail to parse against it are logged and dropped.

use csv::{ErrorKind, ReaderBuilder, StringRecord};
use std::collections::HashSet;
use std::io::Read;
use tracing::{info, warn};

use crate::config::FeedColumns;
use crate::error::{ParseError, PlanError};
use crate::feed::types::{DayCounts, Observation, Period, PeriodCounts, SiteId};
use crate::spatial::parse_point;

/// A `{Day}_{Period}` count column and its position in the header.
#[derive(Debug, Clone, PartialEq)]
pub struct CountColumn {
    pub day: String,
    pub period: Period,
    pub index: usize,
    pub name: String,
}

/// Resolved header layout of a traffic feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSchema {
    pub site_id_index: usize,
    pub geometry_index: usize,
    pub columns: Vec<CountColumn>,
    /// Day labels in order of first appearance.
    pub days: Vec<String>,
}

impl FeedSchema {
    /// Resolves the header against the configured column names.
    ///
    /// With an explicit day list every `{day}_{AM|MD|PM}` column must exist.
    /// Without one, every header ending in `_AM`, `_MD` or `_PM` after a
    /// non-empty day label is a count column.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for a missing id/geometry column, a missing
    /// explicit count column, a duplicated count column, or no count columns.
    pub fn from_headers(headers: &StringRecord, columns: &FeedColumns) -> Result<Self, ParseError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
        };

        let site_id_index = position(&columns.site_id)?;
        let geometry_index = position(&columns.geometry)?;

        let mut count_columns = Vec::new();
        match &columns.days {
            Some(days) => {
                for day in days {
                    for period in Period::ALL {
                        let name = format!("{day}_{}", period.label());
                        let index = position(&name)?;
                        count_columns.push(CountColumn {
                            day: day.clone(),
                            period,
                            index,
                            name,
                        });
                    }
                }
            }
            None => {
                for (index, header) in headers.iter().enumerate() {
                    let header = header.trim();
                    let Some((day, suffix)) = header.rsplit_once('_') else {
                        continue;
                    };
                    let Some(period) = Period::from_label(suffix) else {
                        continue;
                    };
                    if day.is_empty() {
                        continue;
                    }
                    count_columns.push(CountColumn {
                        day: day.to_string(),
                        period,
                        index,
                        name: header.to_string(),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        for column in &count_columns {
            if !seen.insert((column.day.as_str(), column.period)) {
                return Err(ParseError::DuplicateColumn(column.name.clone()));
            }
        }

        if count_columns.is_empty() {
            return Err(ParseError::NoCountColumns);
        }

        let mut days: Vec<String> = Vec::new();
        for column in &count_columns {
            if !days.contains(&column.day) {
                days.push(column.day.clone());
            }
        }

        Ok(Self {
            site_id_index,
            geometry_index,
            columns: count_columns,
            days,
        })
    }

    /// Parses one data row into an [`Observation`].
    pub fn parse_row(&self, record: &StringRecord) -> Result<Observation, ParseError> {
        let cell = |index: usize, name: &str| {
            record
                .get(index)
                .map(str::trim)
                .ok_or_else(|| ParseError::MissingCell(name.to_string()))
        };

        let site_id = cell(self.site_id_index, "site id")?;
        if site_id.is_empty() {
            return Err(ParseError::EmptySiteId);
        }

        let (latitude, longitude) = parse_point(cell(self.geometry_index, "geometry")?)?;

        let mut days: Vec<DayCounts> = self
            .days
            .iter()
            .map(|day| DayCounts {
                day: day.clone(),
                counts: PeriodCounts::default(),
            })
            .collect();

        for column in &self.columns {
            let value = parse_count(&column.name, cell(column.index, &column.name)?)?;
            if let Some(entry) = days.iter_mut().find(|d| d.day == column.day) {
                entry.counts.set(column.period, value);
            }
        }

        Ok(Observation {
            site_id: SiteId::new(site_id),
            latitude,
            longitude,
            days,
        })
    }
}

/// Empty cells are missing counts. Thousands separators are accepted.
fn parse_count(column: &str, raw: &str) -> Result<Option<f64>, ParseError> {
    if raw.is_empty() {
        return Ok(None);
    }

    let invalid = || ParseError::InvalidCount {
        column: column.to_string(),
        value: raw.to_string(),
    };

    let value: f64 = raw.replace(',', "").parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(Some(value))
}

/// Parsed traffic feed: its schema and every row that parsed cleanly.
#[derive(Debug, Clone)]
pub struct TrafficFeed {
    pub schema: FeedSchema,
    pub observations: Vec<Observation>,
    /// Rows dropped because of a [`ParseError`].
    pub rejected: usize,
}

impl TrafficFeed {
    pub fn days(&self) -> &[String] {
        &self.schema.days
    }
}

/// Reads a traffic CSV.
///
/// # Errors
///
/// Fails on an I/O error or a header that does not satisfy [`FeedSchema`].
/// Individual malformed rows, including ones that are not valid UTF-8, are
/// skipped with a warning.
#[tracing::instrument(skip_all)]
pub fn read_traffic<R: Read>(reader: R, columns: &FeedColumns) -> Result<TrafficFeed, PlanError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let schema = FeedSchema::from_headers(&headers, columns)?;

    let mut observations = Vec::new();
    let mut rejected = 0usize;

    for (row, result) in rdr.records().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = row + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) if matches!(e.kind(), ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => {
                rejected += 1;
                warn!(line, error = %e, "Skipping unreadable traffic row");
                continue;
            }
        };
        match schema.parse_row(&record) {
            Ok(observation) => observations.push(observation),
            Err(e) => {
                rejected += 1;
                warn!(line, error = %e, "Skipping traffic row");
            }
        }
    }

    info!(
        rows = observations.len(),
        rejected,
        days = schema.days.len(),
        "Traffic feed parsed"
    );

    Ok(TrafficFeed {
        schema,
        observations,
        rejected,
    })
}
