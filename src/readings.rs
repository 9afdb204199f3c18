use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Time format the readings endpoint expects for `from`/`to`.
pub(crate) const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single timestamped measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
}

/// Aggregation level of a readings query (ISO 8601 durations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    /// `PT1M`, electricity only.
    Minute,
    /// `PT30M`
    HalfHour,
    /// `PT1H`
    Hour,
    /// `P1D`
    Day,
    /// `P1W`, weeks start on Monday.
    Week,
    /// `P1M`
    Month,
    /// `P1Y`
    Year,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Minute => "PT1M",
            Period::HalfHour => "PT30M",
            Period::Hour => "PT1H",
            Period::Day => "P1D",
            Period::Week => "P1W",
            Period::Month => "P1M",
            Period::Year => "P1Y",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pt1m" | "minute" => Ok(Period::Minute),
            "pt30m" | "halfhour" | "half-hour" => Ok(Period::HalfHour),
            "pt1h" | "hour" | "hourly" => Ok(Period::Hour),
            "p1d" | "day" | "daily" => Ok(Period::Day),
            "p1w" | "week" | "weekly" => Ok(Period::Week),
            "p1m" | "month" | "monthly" => Ok(Period::Month),
            "p1y" | "year" | "yearly" => Ok(Period::Year),
            _ => Err(Error::InvalidPeriod(s.to_string())),
        }
    }
}

/// How readings are combined within a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AggregateFunction {
    #[default]
    Sum,
    Avg,
}

impl AggregateFunction {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
        }
    }
}

/// Parameters of a readings request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingsQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period: Period,
    /// Minutes from UTC the vendor applies to returned timestamps.
    pub offset_minutes: i32,
    pub function: AggregateFunction,
}

impl ReadingsQuery {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, period: Period) -> Self {
        Self {
            start,
            end,
            period,
            offset_minutes: 0,
            function: AggregateFunction::Sum,
        }
    }

    pub fn with_offset_minutes(mut self, offset: i32) -> Self {
        self.offset_minutes = offset;
        self
    }

    pub fn with_function(mut self, function: AggregateFunction) -> Self {
        self.function = function;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(Error::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    pub(crate) fn query_pairs(&self) -> [(&'static str, String); 5] {
        [
            ("from", self.start.format(QUERY_TIME_FORMAT).to_string()),
            ("to", self.end.format(QUERY_TIME_FORMAT).to_string()),
            ("period", self.period.to_string()),
            ("offset", self.offset_minutes.to_string()),
            ("function", self.function.as_str().to_string()),
        ]
    }
}

// Shared shape of the readings, current and meterread replies.
#[derive(Debug, Deserialize)]
pub(crate) struct SeriesReply {
    units: String,
    data: Vec<(i64, f64)>,
}

impl SeriesReply {
    pub(crate) fn into_readings(self, url: &str) -> Result<Vec<Reading>> {
        let unit = self.units;
        self.data
            .into_iter()
            .map(|(ts, value)| {
                let timestamp = DateTime::<Utc>::from_timestamp(ts, 0)
                    .ok_or_else(|| Error::parse(url, format!("timestamp {} out of range", ts)))?;
                Ok(Reading {
                    timestamp,
                    value,
                    unit: unit.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_codes() {
        assert_eq!(Period::Hour.to_string(), "PT1H");
        assert_eq!(Period::HalfHour.as_str(), "PT30M");
        assert_eq!("P1D".parse::<Period>().unwrap(), Period::Day);
        assert_eq!("hourly".parse::<Period>().unwrap(), Period::Hour);
        assert!(matches!(
            "fortnightly".parse::<Period>(),
            Err(Error::InvalidPeriod(_))
        ));
    }

    #[test]
    fn query_pairs_use_vendor_format() {
        let start = Utc.with_ymd_and_hms(2017, 9, 19, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2017, 9, 20, 10, 0, 0).unwrap();
        let q = ReadingsQuery::new(start, end, Period::Day)
            .with_offset_minutes(-60)
            .with_function(AggregateFunction::Avg);

        let pairs = q.query_pairs();
        assert_eq!(pairs[0], ("from", "2017-09-19T10:00:00".to_string()));
        assert_eq!(pairs[1], ("to", "2017-09-20T10:00:00".to_string()));
        assert_eq!(pairs[2], ("period", "P1D".to_string()));
        assert_eq!(pairs[3], ("offset", "-60".to_string()));
        assert_eq!(pairs[4], ("function", "avg".to_string()));
    }

    #[test]
    fn range_validation() {
        let a = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        assert!(ReadingsQuery::new(a, b, Period::Hour).validate().is_ok());
        assert!(ReadingsQuery::new(a, a, Period::Hour).validate().is_ok());
        assert!(matches!(
            ReadingsQuery::new(b, a, Period::Hour).validate(),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn series_keeps_order_and_unit() {
        let reply: SeriesReply = serde_json::from_str(
            r#"{"status":"OK","units":"kWh","data":[[1672534800,0.5],[1672531200,1]]}"#,
        )
        .unwrap();
        let readings = reply.into_readings("test").unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].timestamp.timestamp(), 1672534800);
        assert_eq!(readings[1].value, 1.0);
        assert!(readings.iter().all(|r| r.unit == "kWh"));
    }

    #[test]
    fn series_requires_numeric_points() {
        assert!(serde_json::from_str::<SeriesReply>(r#"{"units":"kWh","data":[[1,null]]}"#).is_err());
        assert!(serde_json::from_str::<SeriesReply>(r#"{"data":[]}"#).is_err());
    }
}
