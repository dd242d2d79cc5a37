use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A window in which a set of products is on sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalePeriod {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub start_time: DateTime<Utc>,
}

impl SalePeriod {
    /// The period with the latest start time not after `now`.
    pub fn current(periods: &[SalePeriod], now: DateTime<Utc>) -> Option<&SalePeriod> {
        periods
            .iter()
            .filter(|p| p.start_time <= now)
            .max_by_key(|p| p.start_time)
    }
}

/// A period during which the shop refuses checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreClosure {
    #[serde(default)]
    pub id: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub show_order_check: bool,
}

impl StoreClosure {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }

    /// Seconds until reopening, only reported when under a day away.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let remaining = self.end_time - now;
        (remaining < Duration::hours(24)).then(|| remaining.num_seconds().max(0))
    }

    pub fn active<'a>(closures: &'a [StoreClosure], now: DateTime<Utc>) -> Option<&'a StoreClosure> {
        closures.iter().find(|c| c.is_active(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_sale_period() {
        let now = Utc::now();
        let periods = vec![
            SalePeriod { id: Some(1), name: "Old".into(), start_time: now - Duration::days(30) },
            SalePeriod { id: Some(2), name: "Now".into(), start_time: now - Duration::days(1) },
            SalePeriod { id: Some(3), name: "Next".into(), start_time: now + Duration::days(5) },
        ];
        assert_eq!(SalePeriod::current(&periods, now).and_then(|p| p.id), Some(2));
        assert!(SalePeriod::current(&periods[2..], now).is_none());
    }

    #[test]
    fn test_closure_window() {
        let now = Utc::now();
        let closure = StoreClosure {
            id: Some(1),
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(2),
            message: "Stock take".into(),
            show_order_check: true,
        };
        assert!(closure.is_active(now));
        assert!(!closure.is_active(closure.end_time));
        assert_eq!(closure.seconds_remaining(now), Some(7200));

        let long = StoreClosure { end_time: now + Duration::days(3), ..closure };
        assert_eq!(long.seconds_remaining(now), None);
    }
}
