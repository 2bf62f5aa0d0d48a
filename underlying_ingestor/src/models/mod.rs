pub mod cell;
pub mod request_params;
pub mod row_set;

pub use cell::CellValue;
pub use request_params::UnderlyingInfoParams;
pub use row_set::{Record, RowSet};
