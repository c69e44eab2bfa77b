pub mod dataset;
pub mod record;
pub mod segmentation;

pub use dataset::{Dataset, SplitKind};
pub use record::ConfidenceRecord;
pub use segmentation::{Segmentation, BOUNDARY_MARK};
