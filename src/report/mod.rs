// Report aggregation: fetch ticket-monitor figures, rank and bucket them, and
// lay them out as chat messages.

pub mod aging;
pub mod counts;
pub mod endpoints;
pub mod errors;
pub mod pipeline;
pub mod ranking;
pub mod render;
pub mod summary;

pub use aging::{AgingBuckets, AgingEntity};
pub use counts::{ClosedTicketCounts, OpenTicketCounts};
pub use endpoints::EndpointSet;
pub use errors::ReportError;
pub use pipeline::{DailyReport, ReportPipeline};
pub use ranking::{RankingEntry, SlaBucket};
pub use render::{ReportFragment, Section};
pub use summary::{KipTableRow, SummaryEndpoints};
