//! Schedule providers
//!
//! - [`traits`]: the [`ScheduleProvider`] seam used by the ingestion cycle
//! - [`press_association`]: HTTP client for the PressAssociation TV API

pub mod press_association;
pub mod traits;

pub use press_association::PressAssociationClient;
pub use traits::ScheduleProvider;
