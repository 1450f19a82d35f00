//! Unit tests for climtrend modules
//!
//! These tests cover time decoding, normalization, the regression core and the
//! presentation helpers using in-memory datasets.

use climtrend::{
    calendar::{CalendarKind, CfDatetime, Timestamp},
    cf_time::{decode, CfTimeUnits, TimeUnit},
    config::AnalysisConfig,
    data_source::{DataSource, Dataset, ObservationField},
    errors::{ClimTrendError, RegressionIssue},
    metadata::{detect_time_format, first_data_variable, uses_model_calendar, variable_units},
    parallel::{get_parallel_info, ParallelConfig},
    pipeline::analyze_source,
    regional::{regional_mean, regional_mean_default},
    render::{figure_file_name, save_figure, Renderer, TextRenderer, TrendAnalysis},
    time_normalizer::{normalize, NumericTime},
    trend::{
        checked_time_axis, compute_trend, linear_regression, significant_fraction,
        trend_over_axis, unravel_index, MissingValuePolicy, TrendOptions, TrendResult,
    },
};
use chrono::NaiveDate;
use ndarray::{ArrayD, IxDyn};
use std::cell::Cell;
use tempfile::tempdir;

/// Monthly mid-month timestamps on the noleap calendar starting January 1850
fn noleap_months(count: usize) -> Vec<Timestamp> {
    (0..count)
        .map(|i| {
            Timestamp::Calendar(CfDatetime::new(
                1850 + (i / 12) as i32,
                (i % 12) as u32 + 1,
                15,
                CalendarKind::NoLeap,
            ))
        })
        .collect()
}

/// A (time, lat, lon) field whose values grow linearly in time at every point
fn linear_field(times: usize, lats: usize, lons: usize) -> ObservationField {
    let data = ArrayD::from_shape_fn(IxDyn(&[times, lats, lons]), |idx| {
        let (t, la, lo) = (idx[0] as f64, idx[1] as f64, idx[2] as f64);
        let noise = ((idx[0] * 7 + idx[1] * 3 + idx[2]) % 5) as f64 * 0.1;
        (la + 1.0) * t + 0.5 * lo + noise
    });
    ObservationField::new("PRECT", &["time", "lat", "lon"], data)
        .expect("Failed to build field")
        .with_units("m/s")
}

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn test_error_display() {
    let var_err = ClimTrendError::VariableNotFound {
        var: "PRECT".to_string(),
    };
    assert!(format!("{}", var_err).contains("Variable 'PRECT' not found"));

    let axis_err = ClimTrendError::TimeAxisNotFound {
        axis: "time".to_string(),
    };
    assert!(format!("{}", axis_err).contains("No 'time' dimension"));

    let wrapped = ClimTrendError::NormalizationFailed(Box::new(ClimTrendError::EmptyTimeAxis));
    assert!(format!("{}", wrapped).contains("Time coordinate is empty"));
    assert!(std::error::Error::source(&wrapped).is_some());

    let reg_err = ClimTrendError::RegressionFailed {
        coordinate: Some(vec![1, 2]),
        issue: RegressionIssue::MissingValues,
    };
    let text = format!("{}", reg_err);
    assert!(text.contains("[1, 2]"));
    assert!(text.contains("missing values"));
}

#[test]
fn test_calendar_names() {
    assert_eq!("noleap".parse::<CalendarKind>().unwrap(), CalendarKind::NoLeap);
    assert_eq!("365_day".parse::<CalendarKind>().unwrap(), CalendarKind::NoLeap);
    assert_eq!("Gregorian".parse::<CalendarKind>().unwrap(), CalendarKind::Standard);
    assert_eq!("360_day".parse::<CalendarKind>().unwrap(), CalendarKind::Day360);
    assert_eq!(
        CalendarKind::from_attribute(None).unwrap(),
        CalendarKind::Standard
    );

    match "lunar".parse::<CalendarKind>() {
        Err(ClimTrendError::UnsupportedCalendar { calendar }) => assert_eq!(calendar, "lunar"),
        other => panic!("expected UnsupportedCalendar, got {:?}", other),
    }

    assert_eq!(CalendarKind::Day360.to_string(), "360_day");
}

#[test]
fn test_calendar_year_lengths() {
    assert_eq!(CalendarKind::NoLeap.days_in_year(2000), 365);
    assert_eq!(CalendarKind::AllLeap.days_in_year(2001), 366);
    assert_eq!(CalendarKind::Day360.days_in_year(2000), 360);
    assert_eq!(CalendarKind::Julian.days_in_year(1900), 366);
    assert_eq!(CalendarKind::Standard.days_in_year(1900), 365);
    assert_eq!(CalendarKind::Standard.days_in_year(2000), 366);
    assert_eq!(CalendarKind::Day360.days_in_month(2000, 2), 30);
    assert_eq!(CalendarKind::Julian.days_in_month(1900, 2), 29);
}

#[test]
fn test_cf_datetime_day_arithmetic() {
    let start = CfDatetime::new(1850, 12, 31, CalendarKind::NoLeap);
    let next = start.add_seconds(86_400).unwrap();
    assert_eq!((next.year, next.month, next.day), (1851, 1, 1));

    let back = next.add_seconds(-86_400 * 365).unwrap();
    assert_eq!((back.year, back.month, back.day), (1850, 1, 1));

    let date = CfDatetime::new(1999, 7, 30, CalendarKind::Day360);
    let round_trip =
        CfDatetime::from_day_number(date.day_number(), 0, CalendarKind::Day360).unwrap();
    assert_eq!(round_trip, date);

    let noon = CfDatetime::new(1850, 1, 1, CalendarKind::NoLeap)
        .add_seconds(43_200)
        .unwrap();
    assert_eq!((noon.hour, noon.minute, noon.second), (12, 0, 0));

    // Years beyond the i32 range are rejected instead of wrapping
    assert!(CalendarKind::NoLeap.year_and_day(i64::MAX / 2).is_none());
    assert!(CalendarKind::Julian.year_and_day(1_461 * i64::from(i32::MAX / 2)).is_none());
    assert_eq!(CalendarKind::NoLeap.year_and_day(365 * 2000 + 3), Some((2000, 3)));
    assert!(CfDatetime::new(1850, 1, 1, CalendarKind::Day360)
        .add_seconds(i64::MAX)
        .is_none());
}

#[test]
fn test_time_units_parsing() {
    let units = CfTimeUnits::parse("days since 1850-01-01 00:00:00").unwrap();
    assert_eq!(units.unit, TimeUnit::Days);
    assert_eq!(units.reference.year, 1850);
    assert_eq!(units.reference.month, 1);

    let units = CfTimeUnits::parse("hours since 2000-1-1T06:30:00Z").unwrap();
    assert_eq!(units.unit, TimeUnit::Hours);
    assert_eq!((units.reference.hour, units.reference.minute), (6, 30));

    let units = CfTimeUnits::parse("seconds since 1970-01-01").unwrap();
    assert_eq!(units.unit, TimeUnit::Seconds);

    for bad in [
        "days after 1850-01-01",
        "fortnights since 1850-01-01",
        "days since 1850-13-01",
        "days since",
        "",
    ] {
        match CfTimeUnits::parse(bad) {
            Err(ClimTrendError::InvalidTimeUnits { units }) => assert_eq!(units, bad),
            other => panic!("expected InvalidTimeUnits for {:?}, got {:?}", bad, other),
        }
    }
}

#[test]
fn test_decode_noleap() {
    let ts = decode(
        &[0.0, 31.0, 59.0, 365.0],
        "days since 1850-01-01",
        CalendarKind::NoLeap,
    )
    .unwrap();
    let dates: Vec<String> = ts.iter().map(Timestamp::date_string).collect();
    assert_eq!(
        dates,
        vec!["1850-01-01", "1850-02-01", "1850-03-01", "1851-01-01"]
    );
    assert!(ts.iter().all(|t| matches!(t, Timestamp::Calendar(_))));
}

#[test]
fn test_decode_360_day_and_julian() {
    let ts = decode(&[0.0, 30.0, 360.0], "days since 2000-01-01", CalendarKind::Day360).unwrap();
    assert_eq!(ts[1].date_string(), "2000-02-01");
    assert_eq!(ts[2].date_string(), "2001-01-01");

    let julian = decode(&[59.0], "days since 1900-01-01", CalendarKind::Julian).unwrap();
    assert_eq!(julian[0].date_string(), "1900-02-29");

    let gregorian = decode(&[59.0], "days since 1900-01-01", CalendarKind::Standard).unwrap();
    assert_eq!(gregorian[0].date_string(), "1900-03-01");
}

#[test]
fn test_decode_standard_calendar() {
    let ts = decode(&[36.0], "hours since 2000-01-01 00:00:00", CalendarKind::Standard).unwrap();
    let expected = NaiveDate::from_ymd_opt(2000, 1, 2)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    assert_eq!(ts[0], Timestamp::Standard(expected));
}

#[test]
fn test_decode_errors() {
    // Feb 29 does not exist on the noleap calendar
    assert!(matches!(
        decode(&[0.0], "days since 1850-02-29", CalendarKind::NoLeap),
        Err(ClimTrendError::InvalidTimeUnits { .. })
    ));

    match decode(&[0.0, f64::NAN], "days since 1850-01-01", CalendarKind::NoLeap) {
        Err(ClimTrendError::InvalidTimeValue { index }) => assert_eq!(index, 1),
        other => panic!("expected InvalidTimeValue, got {:?}", other),
    }

    // A corrupt offset far past the i32 year range on every model calendar
    for calendar in [
        CalendarKind::NoLeap,
        CalendarKind::Julian,
        CalendarKind::AllLeap,
        CalendarKind::Day360,
        CalendarKind::Standard,
    ] {
        match decode(&[0.0, 1.0e13], "days since 0001-01-01", calendar) {
            Err(ClimTrendError::InvalidTimeValue { index }) => assert_eq!(index, 1),
            other => panic!("expected InvalidTimeValue on {}, got {:?}", calendar, other),
        }
    }
}

#[test]
fn test_normalize_model_calendar_formula() {
    let ts = [Timestamp::Calendar(CfDatetime::new(1850, 3, 10, CalendarKind::NoLeap))];
    let time = normalize(Some(&ts[..])).unwrap();
    assert_close(time.as_slice()[0], 1850.25, 1e-12);

    // Day of month does not contribute on the model-calendar path
    let first = Timestamp::Calendar(CfDatetime::new(1850, 3, 1, CalendarKind::Day360));
    let last = Timestamp::Calendar(CfDatetime::new(1850, 3, 28, CalendarKind::Day360));
    let time = normalize(Some(&[first, last][..])).unwrap();
    assert_eq!(time.as_slice()[0], time.as_slice()[1]);
}

#[test]
fn test_normalize_standard_uses_full_date() {
    let noon_jan2 = NaiveDate::from_ymd_opt(2000, 1, 2)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let time = normalize(Some(&[Timestamp::Standard(noon_jan2)][..])).unwrap();
    assert_close(time.as_slice()[0], 2000.0 + 1.5 / 366.0, 1e-12);

    let march = NaiveDate::from_ymd_opt(1850, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let time = normalize(Some(&[Timestamp::Standard(march)][..])).unwrap();
    assert_close(time.as_slice()[0], 1850.0 + 59.0 / 365.0, 1e-12);
}

#[test]
fn test_normalize_monotonic_and_same_length() {
    let ts = noleap_months(30);
    let time = normalize(Some(ts.as_slice())).unwrap();
    assert_eq!(time.len(), ts.len());
    assert!(time.is_non_decreasing());
    assert_eq!(time.step_months(), Some(1));
    let (start, end) = time.range().unwrap();
    assert!(start < end);
}

#[test]
fn test_normalize_errors() {
    assert!(matches!(normalize(None), Err(ClimTrendError::MissingTimeAxis)));
    let empty: Vec<Timestamp> = Vec::new();
    assert!(matches!(
        normalize(Some(empty.as_slice())),
        Err(ClimTrendError::EmptyTimeAxis)
    ));
}

#[test]
fn test_linear_regression_perfect_fit() {
    let fit = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap();
    assert_close(fit.slope, 2.0, 1e-12);
    assert_close(fit.intercept, 1.0, 1e-12);
    assert_close(fit.r_value, 1.0, 1e-12);
    assert!(fit.p_value < 1e-10);
}

#[test]
fn test_linear_regression_p_value() {
    let fit = linear_regression(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0, 2.0, 1.3, 3.75, 2.25]).unwrap();
    assert_close(fit.slope, 0.425, 1e-12);
    assert_close(fit.intercept, 0.785, 1e-12);
    assert_close(fit.r_value, 0.626_832_748_978_957_6, 1e-9);
    assert_close(fit.p_value, 0.257_777_302_853_888_6, 1e-6);
    assert_close(fit.std_err, 0.305, 1e-9);
}

#[test]
fn test_linear_regression_flat_series() {
    let fit = linear_regression(&[0.0, 1.0, 2.0], &[4.0, 4.0, 4.0]).unwrap();
    assert_eq!(fit.slope, 0.0);
    assert_close(fit.p_value, 1.0, 1e-12);
}

#[test]
fn test_linear_regression_two_points() {
    let fit = linear_regression(&[0.0, 1.0], &[1.0, 4.0]).unwrap();
    assert_close(fit.slope, 3.0, 1e-12);
    assert_eq!(fit.p_value, 0.0);

    let flat = linear_regression(&[0.0, 1.0], &[2.0, 2.0]).unwrap();
    assert_eq!(flat.p_value, 1.0);
}

#[test]
fn test_linear_regression_failures() {
    let issue = |result| match result {
        Err(ClimTrendError::RegressionFailed {
            coordinate: None,
            issue,
        }) => issue,
        other => panic!("expected RegressionFailed, got {:?}", other),
    };

    assert_eq!(
        issue(linear_regression(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0])),
        RegressionIssue::ZeroTimeVariance
    );
    assert_eq!(
        issue(linear_regression(&[0.0, 1.0, 2.0], &[1.0, f64::NAN, 3.0])),
        RegressionIssue::MissingValues
    );
    assert_eq!(
        issue(linear_regression(&[0.0, 1.0], &[1.0, 2.0, 3.0])),
        RegressionIssue::LengthMismatch
    );
    assert_eq!(
        issue(linear_regression(&[0.0], &[1.0])),
        RegressionIssue::TooFewPoints
    );
}

#[test]
fn test_unravel_index() {
    assert_eq!(unravel_index(0, &[2, 3]), vec![0, 0]);
    assert_eq!(unravel_index(4, &[2, 3]), vec![1, 1]);
    assert_eq!(unravel_index(5, &[2, 3, 1]), vec![1, 2, 0]);
    assert!(unravel_index(0, &[]).is_empty());
}

#[test]
fn test_compute_trend_grid() {
    let field = linear_field(24, 2, 3);
    let dataset = Dataset::new()
        .with_time_axis("time", noleap_months(24))
        .with_variable(field);

    let result = compute_trend(&dataset, "PRECT", "time", &TrendOptions::default()).unwrap();
    assert_eq!(result.shape(), &[2, 3]);
    assert_eq!(result.dimensions, vec!["lat", "lon"]);
    assert!(result.undefined.is_empty());

    // Values grow by (lat + 1) per month, i.e. 12 * (lat + 1) per year, plus bounded noise
    for la in 0..2 {
        for lo in 0..3 {
            let slope = result.slope[[la, lo]];
            assert_close(slope, 12.0 * (la as f64 + 1.0), 0.5);
            assert!(result.p_value[[la, lo]] < 1e-6);
        }
    }
    assert_eq!(result.significant_fraction(0.05), Some(1.0));
}

#[test]
fn test_compute_trend_parallel_matches_sequential() {
    let field = linear_field(18, 3, 4);
    let time = normalize(Some(noleap_months(18).as_slice())).unwrap();

    let parallel = trend_over_axis(&field, &time, 0, &TrendOptions::default()).unwrap();
    let sequential = trend_over_axis(
        &field,
        &time,
        0,
        &TrendOptions {
            parallel: false,
            ..TrendOptions::default()
        },
    )
    .unwrap();

    assert_eq!(parallel.slope, sequential.slope);
    assert_eq!(parallel.p_value, sequential.p_value);
}

#[test]
fn test_trend_independent_of_axis_order() {
    let field = linear_field(12, 2, 3);
    let time = normalize(Some(noleap_months(12).as_slice())).unwrap();
    let reference = trend_over_axis(&field, &time, 0, &TrendOptions::default()).unwrap();

    // Same values stored as (lon, time, lat)
    let permuted = field
        .data
        .clone()
        .permuted_axes(IxDyn(&[2, 0, 1]))
        .as_standard_layout()
        .into_owned();
    let permuted = ObservationField::new("PRECT", &["lon", "time", "lat"], permuted).unwrap();
    let result = trend_over_axis(&permuted, &time, 1, &TrendOptions::default()).unwrap();

    assert_eq!(result.dimensions, vec!["lon", "lat"]);
    for la in 0..2 {
        for lo in 0..3 {
            assert_eq!(result.slope[[lo, la]], reference.slope[[la, lo]]);
            assert_eq!(result.p_value[[lo, la]], reference.p_value[[la, lo]]);
        }
    }
}

#[test]
fn test_missing_values_fail_reports_first_coordinate() {
    let mut field = linear_field(6, 1, 3);
    field.data[[2, 0, 1]] = f64::NAN;
    field.data[[4, 0, 2]] = f64::NAN;
    let time = normalize(Some(noleap_months(6).as_slice())).unwrap();

    match trend_over_axis(&field, &time, 0, &TrendOptions::default()) {
        Err(ClimTrendError::RegressionFailed { coordinate, issue }) => {
            assert_eq!(coordinate, Some(vec![0, 1]));
            assert_eq!(issue, RegressionIssue::MissingValues);
        }
        other => panic!("expected RegressionFailed, got {:?}", other),
    }
}

#[test]
fn test_missing_values_mark_undefined() {
    let mut field = linear_field(6, 1, 3);
    field.data[[2, 0, 1]] = f64::NAN;
    let time = normalize(Some(noleap_months(6).as_slice())).unwrap();
    let options = TrendOptions {
        missing: MissingValuePolicy::MarkUndefined,
        parallel: true,
    };

    let result = trend_over_axis(&field, &time, 0, &options).unwrap();
    assert_eq!(result.undefined, vec![vec![0, 1]]);
    assert!(result.slope[[0, 1]].is_nan());
    assert!(result.p_value[[0, 1]].is_nan());
    assert!(result.slope[[0, 0]].is_finite());
    assert!(result.slope[[0, 2]].is_finite());
}

#[test]
fn test_trend_over_axis_shape_errors() {
    let field = linear_field(6, 1, 2);
    let short = NumericTime::from_values(vec![0.0, 1.0, 2.0]);

    assert!(matches!(
        trend_over_axis(&field, &short, 0, &TrendOptions::default()),
        Err(ClimTrendError::LengthMismatch {
            expected: 6,
            found: 3
        })
    ));
    assert!(matches!(
        trend_over_axis(&field, &short, 5, &TrendOptions::default()),
        Err(ClimTrendError::DimensionNotFound { .. })
    ));

    let flat = NumericTime::from_values(vec![5.0; 6]);
    assert!(matches!(
        trend_over_axis(&field, &flat, 0, &TrendOptions::default()),
        Err(ClimTrendError::RegressionFailed {
            coordinate: None,
            issue: RegressionIssue::ZeroTimeVariance
        })
    ));
}

#[test]
fn test_compute_trend_variable_checked_first() {
    // Neither the variable nor the time axis exist: the variable is reported
    let dataset = Dataset::new();
    match compute_trend(&dataset, "TS", "time", &TrendOptions::default()) {
        Err(ClimTrendError::VariableNotFound { var }) => assert_eq!(var, "TS"),
        other => panic!("expected VariableNotFound, got {:?}", other),
    }
}

#[test]
fn test_compute_trend_missing_time_axis() {
    let data = ArrayD::zeros(IxDyn(&[2, 2]));
    let field = ObservationField::new("TS", &["lat", "lon"], data).unwrap();
    let dataset = Dataset::new().with_variable(field);

    assert!(matches!(
        compute_trend(&dataset, "TS", "time", &TrendOptions::default()),
        Err(ClimTrendError::TimeAxisNotFound { .. })
    ));
}

#[test]
fn test_compute_trend_dimension_without_coordinate() {
    let field = linear_field(4, 1, 1);
    let dataset = Dataset::new().with_variable(field);

    match compute_trend(&dataset, "PRECT", "time", &TrendOptions::default()) {
        Err(ClimTrendError::NormalizationFailed(inner)) => {
            assert!(matches!(*inner, ClimTrendError::MissingTimeAxis));
        }
        other => panic!("expected NormalizationFailed, got {:?}", other),
    }
}

#[test]
fn test_compute_trend_single_timestamp() {
    let field = linear_field(1, 2, 2);
    let dataset = Dataset::new()
        .with_time_axis("time", noleap_months(1))
        .with_variable(field);

    assert!(matches!(
        compute_trend(&dataset, "PRECT", "time", &TrendOptions::default()),
        Err(ClimTrendError::InsufficientSamples { count: 1 })
    ));
}

#[test]
fn test_compute_trend_variable_without_time_dimension() {
    let data = ArrayD::zeros(IxDyn(&[2, 2]));
    let orography = ObservationField::new("PHIS", &["lat", "lon"], data).unwrap();
    let dataset = Dataset::new()
        .with_time_axis("time", noleap_months(4))
        .with_variable(orography);

    assert!(matches!(
        compute_trend(&dataset, "PHIS", "time", &TrendOptions::default()),
        Err(ClimTrendError::DimensionNotFound { .. })
    ));
}

#[test]
fn test_compute_trend_zero_variance_time() {
    let same_month = vec![noleap_months(1)[0]; 3];
    let dataset = Dataset::new()
        .with_time_axis("time", same_month)
        .with_variable(linear_field(3, 1, 2));

    assert!(matches!(
        compute_trend(&dataset, "PRECT", "time", &TrendOptions::default()),
        Err(ClimTrendError::RegressionFailed {
            coordinate: None,
            issue: RegressionIssue::ZeroTimeVariance
        })
    ));
}

#[test]
fn test_encoded_time_axis_dataset() {
    let offsets: Vec<f64> = (0..24).map(|m| 15.0 + f64::from(m) * 365.0 / 12.0).collect();
    let dataset = Dataset::new()
        .with_encoded_time_axis("time", &offsets, "days since 1850-01-01", CalendarKind::NoLeap)
        .unwrap()
        .with_variable(linear_field(24, 1, 1));

    assert_eq!(dataset.dimension_len("time"), Some(24));
    assert_eq!(
        dataset.time_units("time").as_deref(),
        Some("days since 1850-01-01")
    );
    let result = compute_trend(&dataset, "PRECT", "time", &TrendOptions::default()).unwrap();
    assert_eq!(result.shape(), &[1, 1]);
}

#[test]
fn test_observation_field_dimension_count() {
    let data = ArrayD::zeros(IxDyn(&[2, 3]));
    assert!(matches!(
        ObservationField::new("x", &["a"], data),
        Err(ClimTrendError::ArrayError(_))
    ));
}

#[test]
fn test_metadata_helpers() {
    let offsets = [0.0, 31.0, 59.0];
    let dataset = Dataset::new()
        .with_encoded_time_axis("time", &offsets, "days since 1850-01-01", CalendarKind::NoLeap)
        .unwrap()
        .with_variable(linear_field(3, 1, 1));

    let info = detect_time_format(&dataset, "time").unwrap().unwrap();
    assert_eq!(info.start, "1850-01-01");
    assert_eq!(info.end, "1850-03-01");
    assert_eq!(info.units, "days since 1850-01-01");
    assert!(detect_time_format(&dataset, "t").unwrap().is_none());

    assert_eq!(variable_units(&dataset, "PRECT"), "m/s");
    assert_eq!(variable_units(&dataset, "missing"), "Unknown");
    assert_eq!(first_data_variable(&dataset).as_deref(), Some("PRECT"));

    let ts = dataset.timestamps("time").unwrap().unwrap();
    assert!(uses_model_calendar(&ts));
    assert!(!uses_model_calendar(&[]));
}

#[test]
fn test_regional_mean_skips_missing_values() {
    let mut data = ArrayD::zeros(IxDyn(&[2, 2, 2]));
    for (i, v) in data.iter_mut().enumerate() {
        *v = i as f64;
    }
    data[[1, 0, 0]] = f64::NAN;
    let field = ObservationField::new("TS", &["time", "lat", "lon"], data)
        .unwrap()
        .with_units("K");

    let mean = regional_mean_default(&field).unwrap();
    assert_eq!(mean.name, "TS_regional_mean");
    assert_eq!(mean.dimensions, vec!["time"]);
    assert_eq!(mean.units, "K");
    assert_close(mean.data[[0]], 1.5, 1e-12);
    // 5, 6, 7 remain at the second time step
    assert_close(mean.data[[1]], 6.0, 1e-12);

    assert!(matches!(
        regional_mean(&field, &["lev"]),
        Err(ClimTrendError::DimensionNotFound { .. })
    ));
}

#[test]
fn test_regional_mean_all_missing() {
    let data = ArrayD::from_elem(IxDyn(&[1, 2, 2]), f64::NAN);
    let field = ObservationField::new("TS", &["time", "lat", "lon"], data).unwrap();
    let mean = regional_mean_default(&field).unwrap();
    assert!(mean.data[[0]].is_nan());
}

fn analysis_for(result: TrendResult) -> TrendAnalysis {
    TrendAnalysis {
        variable: "PRECT".to_string(),
        dataset: "cesmlme_PRECTvolc".to_string(),
        units: "m/s".to_string(),
        start_year: 850.0833,
        end_year: 1850.9,
        result,
        time_info: None,
        latitudes: Some(vec![-45.0, 45.0]),
        longitudes: Some(vec![0.0, 120.0, 240.0]),
    }
}

#[test]
fn test_text_renderer_labels_and_missing_cells() {
    let slope = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, f64::NAN, 3.0, 4.0, 5.0, -6.0])
        .unwrap();
    let p_value =
        ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0.01, f64::NAN, 0.5, 0.01, 0.01, 0.9])
            .unwrap();
    let result = TrendResult {
        slope: slope.clone(),
        p_value,
        dimensions: vec!["lat".to_string(), "lon".to_string()],
        undefined: vec![vec![0, 1]],
    };

    let figure = TextRenderer::default().render(&analysis_for(result)).unwrap();
    assert_eq!(figure.title, "PRECT Trend (850-1851)");
    assert_eq!(figure.colorbar_label, "PRECT Trend (m/s)");
    assert!(figure.caption.starts_with("PRECT Linear Trend (850-1851)."));
    assert!(figure.caption.contains("Units: m/s."));
    assert_eq!((figure.stats.rows, figure.stats.columns), (2, 3));
    assert_eq!(figure.stats.missing_replaced, 1);
    assert_eq!(figure.stats.min_slope, -6.0);
    assert_eq!(figure.stats.max_slope, 5.0);
    assert_eq!(figure.stats.significant_fraction, Some(0.6));
    assert!(figure.body.contains("Dataset: cesmlme_PRECTvolc"));

    // Display substitution never touches the trend itself
    assert!(slope[[0, 1]].is_nan());
}

#[test]
fn test_text_renderer_ensemble_and_axis_order() {
    // (ensemble, lon, lat) with member 1 full of large values
    let slope = ArrayD::from_shape_fn(IxDyn(&[2, 3, 2]), |idx| {
        if idx[0] == 0 {
            (idx[1] * 10 + idx[2]) as f64
        } else {
            1000.0
        }
    });
    let result = TrendResult {
        p_value: ArrayD::from_elem(IxDyn(&[2, 3, 2]), 0.5),
        slope,
        dimensions: vec!["ensemble".to_string(), "lon".to_string(), "lat".to_string()],
        undefined: Vec::new(),
    };

    let renderer = TextRenderer {
        include_grid: false,
        ..TextRenderer::default()
    };
    let figure = renderer.render(&analysis_for(result)).unwrap();
    assert_eq!((figure.stats.rows, figure.stats.columns), (2, 3));
    assert_eq!(figure.stats.max_slope, 21.0);
    assert_eq!(figure.stats.significant_fraction, Some(0.0));
}

#[test]
fn test_text_renderer_rejects_non_grid() {
    let result = TrendResult {
        slope: ArrayD::zeros(IxDyn(&[4])),
        p_value: ArrayD::zeros(IxDyn(&[4])),
        dimensions: vec!["station".to_string()],
        undefined: Vec::new(),
    };
    assert!(matches!(
        TextRenderer::default().render(&analysis_for(result)),
        Err(ClimTrendError::RenderFailed { .. })
    ));
}

#[test]
fn test_save_figure() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let save_dir = temp_dir.path().join("figures");

    let result = TrendResult {
        slope: ArrayD::from_elem(IxDyn(&[2, 3]), 0.5),
        p_value: ArrayD::from_elem(IxDyn(&[2, 3]), 0.01),
        dimensions: vec!["lat".to_string(), "lon".to_string()],
        undefined: Vec::new(),
    };
    let figure = TextRenderer::default().render(&analysis_for(result)).unwrap();
    let path = save_figure(&figure, "PRECT", "volc", "trend", "txt", &save_dir).unwrap();

    assert_eq!(path, save_dir.join("PRECT_volc_trend.txt"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("PRECT Trend (850-1851)"));
    assert_eq!(figure_file_name("TS", "ctrl", "trend", "png"), "TS_ctrl_trend.png");
}

#[test]
fn test_analyze_source_picks_first_variable() {
    let dataset = Dataset::new()
        .with_coordinate("lat", vec![-45.0, 45.0])
        .with_coordinate("lon", vec![0.0, 120.0, 240.0])
        .with_time_axis("time", noleap_months(24))
        .with_variable(linear_field(24, 2, 3));

    let analysis = analyze_source(&dataset, "memory", &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.variable, "PRECT");
    assert_eq!(analysis.units, "m/s");
    assert_close(analysis.start_year, 1850.0 + 1.0 / 12.0, 1e-12);
    assert_close(analysis.end_year, 1852.0, 1e-12);
    assert_eq!(analysis.latitudes, Some(vec![-45.0, 45.0]));
    assert!(analysis.time_info.is_some());
}

#[test]
fn test_analyze_source_reports_missing_variable_first() {
    // The time dimension has no coordinate, but the unknown variable wins
    let dataset = Dataset::new().with_variable(linear_field(4, 1, 1));
    let config = AnalysisConfig {
        variable: Some("NOPE".to_string()),
        ..AnalysisConfig::default()
    };

    match analyze_source(&dataset, "memory", &config) {
        Err(ClimTrendError::VariableNotFound { var }) => assert_eq!(var, "NOPE"),
        other => panic!("expected VariableNotFound, got {:?}", other),
    }
}

#[test]
fn test_analyze_source_reports_missing_time_axis() {
    let data = ArrayD::zeros(IxDyn(&[2, 2]));
    let orography = ObservationField::new("PHIS", &["lat", "lon"], data).unwrap();
    let dataset = Dataset::new().with_variable(orography);

    match analyze_source(&dataset, "memory", &AnalysisConfig::default()) {
        Err(ClimTrendError::TimeAxisNotFound { axis }) => assert_eq!(axis, "time"),
        other => panic!("expected TimeAxisNotFound, got {:?}", other),
    }
}

/// Dataset wrapper counting how often the time coordinate is decoded
struct CountingSource {
    inner: Dataset,
    decodes: Cell<usize>,
}

impl DataSource for CountingSource {
    fn has_variable(&self, name: &str) -> bool {
        self.inner.has_variable(name)
    }
    fn has_time_axis(&self, axis: &str) -> bool {
        self.inner.has_time_axis(axis)
    }
    fn timestamps(&self, axis: &str) -> climtrend::errors::Result<Option<Vec<Timestamp>>> {
        self.decodes.set(self.decodes.get() + 1);
        self.inner.timestamps(axis)
    }
    fn time_units(&self, axis: &str) -> Option<String> {
        self.inner.time_units(axis)
    }
    fn read_field(&self, name: &str) -> climtrend::errors::Result<ObservationField> {
        self.inner.read_field(name)
    }
    fn variable_units(&self, name: &str) -> Option<String> {
        self.inner.variable_units(name)
    }
    fn data_variables(&self) -> Vec<String> {
        self.inner.data_variables()
    }
    fn coordinate_values(&self, name: &str) -> climtrend::errors::Result<Option<Vec<f64>>> {
        self.inner.coordinate_values(name)
    }
}

#[test]
fn test_analyze_source_decodes_time_once() {
    let source = CountingSource {
        inner: Dataset::new()
            .with_time_axis("time", noleap_months(12))
            .with_variable(linear_field(12, 2, 2)),
        decodes: Cell::new(0),
    };

    let analysis = analyze_source(&source, "memory", &AnalysisConfig::default()).unwrap();
    assert_eq!(source.decodes.get(), 1);
    assert_eq!(
        analysis.time_info,
        detect_time_format(&source.inner, "time").unwrap()
    );

    let checked = checked_time_axis(&source.inner, "PRECT", "time").unwrap();
    assert_eq!(checked.timestamps.len(), 12);
    assert_eq!(checked.time.len(), 12);
}

#[test]
fn test_significant_fraction_shared_by_result_and_figure() {
    let p_value = ArrayD::from_shape_vec(
        IxDyn(&[2, 3]),
        vec![0.01, f64::NAN, 0.2, 0.04, 0.5, 0.001],
    )
    .unwrap();
    let result = TrendResult {
        slope: ArrayD::from_elem(IxDyn(&[2, 3]), 1.0),
        p_value: p_value.clone(),
        dimensions: vec!["lat".to_string(), "lon".to_string()],
        undefined: Vec::new(),
    };

    let expected = Some(3.0 / 5.0);
    assert_eq!(significant_fraction(p_value.iter(), 0.05), expected);
    assert_eq!(result.significant_fraction(0.05), expected);
    assert_eq!(significant_fraction(&[f64::NAN, f64::INFINITY], 0.05), None);
    assert_eq!(significant_fraction(Vec::<f64>::new().iter(), 0.05), None);

    let figure = TextRenderer::default().render(&analysis_for(result)).unwrap();
    assert_eq!(figure.stats.significant_fraction, expected);
}

#[test]
fn test_config_from_json() {
    let config = AnalysisConfig::from_json_str(
        r#"{
            "scenarios": ["cesmlme_PRECTvolc", "cesmlme_PRECTctrl"],
            "variable": "PRECT",
            "missing_values": "mark_undefined",
            "threads": 4
        }"#,
    )
    .unwrap();
    assert_eq!(config.scenarios.len(), 2);
    assert_eq!(config.variable.as_deref(), Some("PRECT"));
    assert_eq!(config.missing_values, MissingValuePolicy::MarkUndefined);
    assert_eq!(config.threads, Some(4));
    assert_eq!(config.time_axis, "time");
    assert_eq!(
        config.scenario_path("cesmlme_PRECTctrl"),
        std::path::PathBuf::from("data/cesmlme_PRECTctrl.nc")
    );

    assert!(matches!(
        AnalysisConfig::from_json_str(r#"{"scenario": "x"}"#),
        Err(ClimTrendError::ConfigError(_))
    ));
}

#[test]
fn test_config_from_file() {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, r#"{"alpha": 0.1, "figure_format": "svg"}"#).unwrap();

    let config = AnalysisConfig::from_json_file(&path).unwrap();
    assert_eq!(config.alpha, 0.1);
    assert_eq!(config.figure_format, "svg");
    assert_eq!(config.missing_values, MissingValuePolicy::Fail);

    assert!(matches!(
        AnalysisConfig::from_json_file(&temp_dir.path().join("absent.json")),
        Err(ClimTrendError::IoError(_))
    ));
}

#[test]
fn test_parallel_config() {
    let default_config = ParallelConfig::default();
    assert!(default_config.num_threads.is_none());

    let config_4 = ParallelConfig::with_threads(4);
    assert_eq!(config_4.num_threads, Some(4));

    let all_cores = ParallelConfig::all_cores();
    assert!(all_cores.num_threads.unwrap() > 0);
    assert!(default_config.current_threads() > 0);

    let config = AnalysisConfig {
        threads: Some(3),
        ..AnalysisConfig::default()
    };
    assert_eq!(ParallelConfig::from_analysis(&config).num_threads, Some(3));

    let info = get_parallel_info();
    assert!(info.current_threads > 0);
    assert!(info.available_cores > 0);
    assert_eq!(info.points_per_thread(0), 0);
    assert!(info.points_per_thread(1_000) >= 1_000 / info.current_threads);
    info.log();
}
