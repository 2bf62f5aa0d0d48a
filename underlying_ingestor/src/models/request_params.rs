use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Parameters for one underlying-info request.
///
/// The vendor publishes one snapshot per trading date, so the date is the
/// only required input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderlyingInfoParams {
    /// Snapshot date (the job's load date).
    pub date: NaiveDate,
}

impl UnderlyingInfoParams {
    pub fn for_date(date: NaiveDate) -> Self {
        Self { date }
    }
}
