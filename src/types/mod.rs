pub mod commit;
pub mod cv;
pub mod error;
pub mod summary;

pub use commit::{CommitRecord, TechnologySet, TechnologyTag};
pub use cv::{CvDocument, CvEntry, ResumePayload};
pub use error::{CvError, ProviderError, Result};
pub use summary::{DateRange, Period, PeriodKind, PeriodSummary, last_day_of_month, week_start};
