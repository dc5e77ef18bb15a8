//! Placement resolver: fish transferred into the assignment on a date.

use chrono::NaiveDate;

use aquatrack_domain::WindowObservations;

/// Summed `transferred_count` over completed transfers landing on `date`.
pub fn resolve_placements(data: &WindowObservations, date: NaiveDate) -> i64 {
    data.transfers_in
        .iter()
        .filter(|transfer| transfer.execution_date == date)
        .map(|transfer| transfer.transferred_count)
        .sum()
}
