//! TimeSeriesSlice operation

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use sift_core::Dataset;

use crate::charts::{some_if_nonempty, Chart, ChartSpec};
use crate::EdaError;

use super::require_column;

/// Time bucketing granularity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Raw,
    Day,
    Week,
    Month,
}

/// One aggregated point of the output series
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub bucket_key: String,
    pub timestamp: String,
    pub value: f64,
}

/// TimeSeriesSlice result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub dataset_id: String,
    pub date_column: String,
    pub value_column: String,
    pub granularity: Granularity,
    pub series: Vec<SeriesPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<Vec<Chart>>,
}

/// Aggregate a numeric value column over a date column.
///
/// Rows whose value is not a JSON number or whose date fails to parse are
/// dropped. Each bucket's value is the mean of the values falling into it;
/// the series is sorted ascending by timestamp string. With a
/// `moving_average_window` of at least 2, a trailing moving-average chart
/// is added: the window covers the preceding `window` points and simply
/// shortens at the start of the series, never looking ahead.
pub fn time_series_slice(
    dataset: &Dataset,
    date_column: &str,
    value_column: &str,
    granularity: Granularity,
    moving_average_window: Option<usize>,
) -> Result<TimeSeries, EdaError> {
    require_column(dataset, date_column)?;
    require_column(dataset, value_column)?;

    struct Bucket {
        sum: f64,
        count: usize,
        first_seen: DateTime<Utc>,
    }

    let mut buckets: HashMap<String, Bucket> = HashMap::new();
    for row in &dataset.rows {
        let Some(v) = row.get(value_column).and_then(Value::as_f64) else {
            continue;
        };
        let Some(date) = row.get(date_column).and_then(parse_date) else {
            continue;
        };
        let key = bucket_key(&date, granularity);
        let bucket = buckets.entry(key).or_insert(Bucket {
            sum: 0.0,
            count: 0,
            first_seen: date,
        });
        bucket.sum += v;
        bucket.count += 1;
    }

    let mut series: Vec<SeriesPoint> = buckets
        .into_iter()
        .map(|(bucket_key, bucket)| SeriesPoint {
            bucket_key,
            timestamp: bucket
                .first_seen
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            value: bucket.sum / bucket.count as f64,
        })
        .collect();
    series.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let mut charts = vec![Chart::new(
        ChartSpec::line(
            format!("timeseries-{}-{}-{}", dataset.id, date_column, value_column),
            "timestamp",
            "value",
        )
        .with_title(format!("Average {value_column} over {date_column}")),
        series
            .iter()
            .map(|p| serde_json::to_value(p).unwrap_or(Value::Null))
            .collect(),
    )];

    if let Some(window) = moving_average_window.filter(|w| *w >= 2) {
        if !series.is_empty() {
            let ma_data: Vec<Value> = series
                .iter()
                .enumerate()
                .map(|(i, point)| {
                    let start = i.saturating_sub(window - 1);
                    let slice = &series[start..=i];
                    let avg = slice.iter().map(|p| p.value).sum::<f64>() / slice.len() as f64;
                    json!({"timestamp": point.timestamp, "maValue": avg})
                })
                .collect();
            charts.push(Chart::new(
                ChartSpec::line(
                    format!(
                        "timeseries-ma-{}-{}-{}",
                        dataset.id, date_column, value_column
                    ),
                    "timestamp",
                    "maValue",
                )
                .with_title(format!("Moving average ({window}) of {value_column}")),
                ma_data,
            ));
        }
    }

    Ok(TimeSeries {
        dataset_id: dataset.id.clone(),
        date_column: date_column.to_string(),
        value_column: value_column.to_string(),
        granularity,
        series,
        charts: some_if_nonempty(charts),
    })
}

/// Parse a row's date value.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD[ HH:MM:SS]` (space or `T`
/// separated), `YYYY/MM/DD`, and integer epoch milliseconds.
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            for format in ["%Y-%m-%d", "%Y/%m/%d"] {
                if let Ok(date) = NaiveDate::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
                }
            }
            None
        }
        _ => None,
    }
}

/// Bucket key for a parsed instant at the requested granularity.
///
/// `week` keys on the ISO-8601 week-year and week number (week 1 is the
/// week containing the year's first Thursday).
fn bucket_key(date: &DateTime<Utc>, granularity: Granularity) -> String {
    match granularity {
        Granularity::Raw => date.to_rfc3339_opts(SecondsFormat::Millis, true),
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Month => date.format("%Y-%m").to_string(),
        Granularity::Week => {
            let iso = date.iso_week();
            format!("{}-W{:02}", iso.year(), iso.week())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::dataset;

    fn sales_dataset() -> Dataset {
        dataset(
            "sales.csv",
            vec![
                json!({"date": "2024-03-01", "amount": 10.0}),
                json!({"date": "2024-03-01", "amount": 20.0}),
                json!({"date": "2024-03-02", "amount": 30.0}),
                json!({"date": "2024-02-28", "amount": 5.0}),
                json!({"date": "not a date", "amount": 99.0}),
                json!({"date": "2024-03-02", "amount": "oops"}),
            ],
        )
    }

    #[test]
    fn test_day_buckets_average_and_sort_ascending() {
        let result =
            time_series_slice(&sales_dataset(), "date", "amount", Granularity::Day, None)
                .expect("ok");

        let keys: Vec<&str> = result.series.iter().map(|p| p.bucket_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-02-28", "2024-03-01", "2024-03-02"]);

        // 2024-03-01 bucket holds the mean of 10 and 20.
        assert!((result.series[1].value - 15.0).abs() < 1e-12);
        assert!((result.series[2].value - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_unparseable_rows_are_dropped() {
        let result =
            time_series_slice(&sales_dataset(), "date", "amount", Granularity::Day, None)
                .expect("ok");
        assert_eq!(result.series.len(), 3);
        assert!(result.series.iter().all(|p| p.value < 99.0));
    }

    #[test]
    fn test_month_and_week_bucket_keys() {
        let result =
            time_series_slice(&sales_dataset(), "date", "amount", Granularity::Month, None)
                .expect("ok");
        let keys: Vec<&str> = result.series.iter().map(|p| p.bucket_key.as_str()).collect();
        assert_eq!(keys, vec!["2024-02", "2024-03"]);

        // 2024-01-01 is a Monday of ISO week 1; 2023-01-01 is a Sunday and
        // belongs to ISO week 52 of 2022.
        let ds = dataset(
            "weeks.csv",
            vec![
                json!({"date": "2024-01-01", "v": 1.0}),
                json!({"date": "2023-01-01", "v": 2.0}),
            ],
        );
        let result = time_series_slice(&ds, "date", "v", Granularity::Week, None).expect("ok");
        let keys: Vec<&str> = result.series.iter().map(|p| p.bucket_key.as_str()).collect();
        assert_eq!(keys, vec!["2022-W52", "2024-W01"]);
    }

    #[test]
    fn test_raw_granularity_keys_on_full_timestamp() {
        let ds = dataset(
            "raw.csv",
            vec![
                json!({"date": "2024-03-01T10:00:00Z", "v": 1.0}),
                json!({"date": "2024-03-01T11:00:00Z", "v": 2.0}),
            ],
        );
        let result = time_series_slice(&ds, "date", "v", Granularity::Raw, None).expect("ok");
        assert_eq!(result.series.len(), 2);
        assert_eq!(result.series[0].bucket_key, "2024-03-01T10:00:00.000Z");
    }

    #[test]
    fn test_moving_average_window_shortens_at_series_start() {
        let ds = dataset(
            "ma.csv",
            vec![
                json!({"date": "2024-01-01", "v": 2.0}),
                json!({"date": "2024-01-02", "v": 4.0}),
                json!({"date": "2024-01-03", "v": 6.0}),
                json!({"date": "2024-01-04", "v": 8.0}),
            ],
        );
        let result =
            time_series_slice(&ds, "date", "v", Granularity::Day, Some(3)).expect("ok");
        let charts = result.charts.expect("charts");
        assert_eq!(charts.len(), 2);

        let ma = &charts[1];
        assert_eq!(ma.spec.y_field, "maValue");
        let values: Vec<f64> = ma.data.iter().map(|p| p["maValue"].as_f64().unwrap()).collect();
        // windows: [2], [2,4], [2,4,6], [4,6,8]
        assert_eq!(values, vec![2.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_epoch_millisecond_dates_parse() {
        let ds = dataset(
            "epoch.csv",
            vec![json!({"date": 1_709_251_200_000i64, "v": 1.0})],
        );
        let result = time_series_slice(&ds, "date", "v", Granularity::Day, None).expect("ok");
        assert_eq!(result.series[0].bucket_key, "2024-03-01");
    }

    #[test]
    fn test_unknown_columns_are_reported() {
        let err = time_series_slice(&sales_dataset(), "nope", "amount", Granularity::Raw, None)
            .unwrap_err();
        assert!(matches!(err, EdaError::ColumnNotFound(_)));

        let err = time_series_slice(&sales_dataset(), "date", "nope", Granularity::Raw, None)
            .unwrap_err();
        assert!(matches!(err, EdaError::ColumnNotFound(_)));
    }
}
