//! Feed resolver: recorded feeding events only.

use chrono::NaiveDate;

use aquatrack_domain::{FeedSource, WindowObservations};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedResolution {
    pub feed_kg: f64,
    pub source: FeedSource,
    pub confidence: f64,
}

/// Sum of the container's recorded feed for the day.
pub fn resolve_feed(data: &WindowObservations, date: NaiveDate) -> FeedResolution {
    let total: f64 = data
        .feeding_events
        .iter()
        .filter(|event| event.feeding_date == date)
        .map(|event| event.amount_kg)
        .sum();

    if total > 0.0 {
        FeedResolution {
            feed_kg: total,
            source: FeedSource::Actual,
            confidence: 1.0,
        }
    } else {
        FeedResolution {
            feed_kg: 0.0,
            source: FeedSource::None,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquatrack_domain::FeedingEvent;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn sums_feedings_on_the_day() {
        let data = WindowObservations {
            feeding_events: vec![
                FeedingEvent { id: 1, feeding_date: d("2024-05-02"), amount_kg: 120.5 },
                FeedingEvent { id: 2, feeding_date: d("2024-05-02"), amount_kg: 80.0 },
                FeedingEvent { id: 3, feeding_date: d("2024-05-03"), amount_kg: 60.0 },
            ],
            ..Default::default()
        };
        let resolved = resolve_feed(&data, d("2024-05-02"));
        assert!((resolved.feed_kg - 200.5).abs() < 1e-9);
        assert_eq!(resolved.source, FeedSource::Actual);
        assert_eq!(resolved.confidence, 1.0);
    }

    #[test]
    fn no_feedings_resolve_to_none() {
        let resolved = resolve_feed(&WindowObservations::default(), d("2024-05-02"));
        assert_eq!(resolved.feed_kg, 0.0);
        assert_eq!(resolved.source, FeedSource::None);
        assert_eq!(resolved.confidence, 0.0);
    }
}
