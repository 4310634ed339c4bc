pub mod forcing;
pub mod series;
pub mod site;
pub mod variable;

pub use forcing::ForcingRecord;
pub use series::{calendar_dates, DailySeries, SubdailyRecord, SubdailySeries, Values};
pub use site::Site;
pub use variable::{Provenance, Variable};
