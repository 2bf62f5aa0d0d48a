use crate::models::UnderlyingInfoParams;

/// Path of the underlying-info dataset, relative to the API root.
pub const UNDERLYING_INFO_PATH: &str = "/equities/underlying-info";

/// Query parameters for an underlying-info request, excluding the API key.
pub fn construct_params(params: &UnderlyingInfoParams) -> Vec<(String, String)> {
    vec![("date".to_string(), params.date.format("%Y-%m-%d").to_string())]
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn date_is_iso_formatted() {
        let params = UnderlyingInfoParams::for_date(NaiveDate::from_ymd_opt(2021, 12, 24).unwrap());
        assert_eq!(
            construct_params(&params),
            vec![("date".to_string(), "2021-12-24".to_string())]
        );
    }
}
