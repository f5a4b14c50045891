//! Read side: timeline reconstruction and the guide service built on it

pub mod guide;
pub mod reconstruct;

pub use guide::{GuideRequest, GuideService};
pub use reconstruct::build_timeline;
