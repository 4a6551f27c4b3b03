//! Measurement events, the unit of ingestion.
//!
//! An event names a metric, carries one numeric sample, and optionally the
//! time it was taken at. Events without a timestamp are assigned to the
//! window that is current when they are added.
//!
//! # Text Form
//!
//! ```text
//! name:value
//! name:value@timestamp
//! ```
//!
//! `timestamp` is whole seconds since the epoch. The value is split off at the
//! last `:` so names may not contain one. Names may contain `@`.

use std::str::FromStr;

use crate::error::EventError;

/// A single numeric measurement for a named metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Metric identifier.
    pub name: String,
    /// The sample value.
    pub value: f64,
    /// Seconds since the epoch the sample was taken at, if known.
    pub timestamp: Option<i64>,
}

impl Event {
    /// Creates an event stamped with the time it is added.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: None,
        }
    }

    /// Creates an event taken at `timestamp` seconds since the epoch.
    pub fn at(name: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: Some(timestamp),
        }
    }
}

impl FromStr for Event {
    type Err = EventError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();

        let Some((name, rest)) = line.rsplit_once(':') else {
            return Err(EventError::Malformed {
                line: line.to_string(),
            });
        };

        let (value, timestamp) = match rest.split_once('@') {
            Some((value, ts)) => (value, Some(ts.trim())),
            None => (rest, None),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(EventError::EmptyName);
        }
        if name.contains(':') {
            return Err(EventError::Malformed {
                line: line.to_string(),
            });
        }

        let value = value.trim();
        let parsed: f64 = value.parse().map_err(|_| EventError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;

        let timestamp = timestamp
            .map(|ts| {
                ts.parse::<i64>().map_err(|_| EventError::InvalidTimestamp {
                    name: name.to_string(),
                    timestamp: ts.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            name: name.to_string(),
            value: parsed,
            timestamp,
        })
    }
}
