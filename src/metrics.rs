use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::error::MetricsError;

/// One day of reported cases for a single entity.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    /// `None` when the upstream cell was empty.
    pub new_cases: Option<f64>,
}

#[cfg(test)]
impl DailyRecord {
    pub fn new(date: NaiveDate, new_cases: f64) -> DailyRecord {
        DailyRecord {
            date,
            new_cases: Some(new_cases),
        }
    }
}

/// Day-over-day growth of new cases.
///
/// `Count` is the truncated count of the day itself. It is used at the first
/// day of a series and whenever the previous day reported zero cases, where a
/// ratio is undefined. `Ratio` is `today / yesterday`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrowthRate {
    Count(i64),
    Ratio(f64),
}

impl GrowthRate {
    pub fn value(&self) -> f64 {
        match *self {
            GrowthRate::Count(count) => count as f64,
            GrowthRate::Ratio(ratio) => ratio,
        }
    }
}

impl Serialize for GrowthRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            GrowthRate::Count(count) => serializer.serialize_i64(count),
            GrowthRate::Ratio(ratio) => serializer.serialize_f64(ratio),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetrics {
    pub total: Vec<f64>,
    pub growth: Vec<GrowthRate>,
}

fn checked_cases(series: &[DailyRecord]) -> Result<Vec<f64>, MetricsError> {
    series
        .iter()
        .enumerate()
        .map(|(index, record)| match record.new_cases {
            Some(cases) if cases.is_finite() => Ok(cases),
            Some(_) => Err(MetricsError::InvalidInput {
                index,
                date: record.date,
                reason: "not a finite number",
            }),
            None => Err(MetricsError::InvalidInput {
                index,
                date: record.date,
                reason: "missing value",
            }),
        })
        .collect()
}

fn prefix_sum(cases: &[f64]) -> Vec<f64> {
    cases
        .iter()
        .scan(0f64, |acc, &today| {
            *acc += today;
            Some(*acc)
        })
        .collect()
}

fn growth_rates(cases: &[f64]) -> Vec<GrowthRate> {
    // there is no day before the first one, treat it as zero cases
    let mut yesterday = 0f64;
    cases
        .iter()
        .map(|&today| {
            let rate = if yesterday != 0.0 {
                GrowthRate::Ratio(today / yesterday)
            } else {
                GrowthRate::Count(today.trunc() as i64)
            };
            yesterday = today;
            rate
        })
        .collect()
}

/// Running total of new cases, `total[i]` being the sum of days `0..=i`.
pub fn cumulative_total(series: &[DailyRecord]) -> Result<Vec<f64>, MetricsError> {
    Ok(prefix_sum(&checked_cases(series)?))
}

/// Growth rate of every day relative to the day before, see [`GrowthRate`].
pub fn growth_rate(series: &[DailyRecord]) -> Result<Vec<GrowthRate>, MetricsError> {
    Ok(growth_rates(&checked_cases(series)?))
}

/// Both derived sequences of `series`.
pub fn derive(series: &[DailyRecord]) -> Result<DerivedMetrics, MetricsError> {
    Ok(DerivedMetrics {
        total: cumulative_total(series)?,
        growth: growth_rate(series)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{collection::vec, prop_assert, prop_assert_eq, proptest};

    fn series(cases: &[f64]) -> Vec<DailyRecord> {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        cases
            .iter()
            .enumerate()
            .map(|(i, &c)| DailyRecord::new(start + chrono::Duration::days(i as i64), c))
            .collect()
    }

    #[test]
    fn test_zero_yesterday_falls_back_to_count() {
        let s = series(&[10.0, 0.0, 5.0]);
        assert_eq!(cumulative_total(&s).unwrap(), vec![10.0, 10.0, 15.0]);
        assert_eq!(
            growth_rate(&s).unwrap(),
            vec![
                GrowthRate::Count(10),
                GrowthRate::Ratio(0.0),
                GrowthRate::Count(5)
            ]
        );
    }

    #[test]
    fn test_empty_series() {
        let metrics = derive(&[]).unwrap();
        assert!(metrics.total.is_empty());
        assert!(metrics.growth.is_empty());
    }

    #[test]
    fn test_single_day() {
        let metrics = derive(&series(&[7.0])).unwrap();
        assert_eq!(metrics.total, vec![7.0]);
        assert_eq!(metrics.growth, vec![GrowthRate::Count(7)]);
    }

    #[test]
    fn test_ratio_is_float_division() {
        let metrics = derive(&series(&[4.0, 8.0])).unwrap();
        assert_eq!(metrics.total, vec![4.0, 12.0]);
        assert_eq!(
            metrics.growth,
            vec![GrowthRate::Count(4), GrowthRate::Ratio(2.0)]
        );

        let growth = growth_rate(&series(&[4.0, 6.0])).unwrap();
        assert_eq!(growth[1], GrowthRate::Ratio(1.5));
    }

    #[test]
    fn test_count_is_truncated() {
        let growth = growth_rate(&series(&[5.9, 0.0, 2.5])).unwrap();
        assert_eq!(growth[0], GrowthRate::Count(5));
        assert_eq!(growth[2], GrowthRate::Count(2));
    }

    #[test]
    fn test_missing_value_is_rejected() {
        let mut s = series(&[1.0, 2.0, 3.0]);
        s[1].new_cases = None;
        match derive(&s) {
            Err(MetricsError::InvalidInput { index, date, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(date, s[1].date);
            }
            result => panic!("Unexpected result: {:?}", result),
        }
        assert!(cumulative_total(&s).is_err());
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        let s = series(&[1.0, f64::NAN]);
        assert_eq!(
            growth_rate(&s),
            Err(MetricsError::InvalidInput {
                index: 1,
                date: s[1].date,
                reason: "not a finite number",
            })
        );
        assert!(cumulative_total(&series(&[f64::INFINITY])).is_err());
    }

    #[test]
    fn test_growth_rate_serializes_as_number() {
        let json = serde_json::to_string(&vec![GrowthRate::Count(3), GrowthRate::Ratio(0.5)])
            .unwrap();
        assert_eq!(json, "[3,0.5]");
    }

    proptest! {
        #[test]
        fn test_total_ends_with_sum_and_never_decreases(cases in vec(0u32..100_000, 1..200)) {
            let cases: Vec<f64> = cases.into_iter().map(f64::from).collect();
            let total = cumulative_total(&series(&cases)).unwrap();

            prop_assert_eq!(total.len(), cases.len());
            prop_assert_eq!(total[0], cases[0]);
            prop_assert_eq!(total[total.len() - 1], cases.iter().sum::<f64>());
            prop_assert!(total.windows(2).all(|w| w[0] <= w[1]));
        }

        #[test]
        fn test_growth_rate_policy(cases in vec(0u32..1_000, 1..200)) {
            let cases: Vec<f64> = cases.into_iter().map(f64::from).collect();
            let growth = growth_rate(&series(&cases)).unwrap();

            prop_assert_eq!(growth.len(), cases.len());
            prop_assert_eq!(growth[0], GrowthRate::Count(cases[0] as i64));
            for i in 1..cases.len() {
                if cases[i - 1] == 0.0 {
                    prop_assert_eq!(growth[i], GrowthRate::Count(cases[i] as i64));
                } else {
                    prop_assert!((growth[i].value() - cases[i] / cases[i - 1]).abs() < 1e-12);
                }
            }
        }

        #[test]
        fn test_first_growth_rate_is_todays_count(rest in vec(0u32..1_000, 0..50)) {
            let mut cases = vec![5.0];
            cases.extend(rest.into_iter().map(f64::from));
            let growth = growth_rate(&series(&cases)).unwrap();
            prop_assert_eq!(growth[0], GrowthRate::Count(5));
            prop_assert_eq!(growth[0].value(), 5.0);
        }
    }
}
