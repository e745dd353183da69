//! Row types of the Record Store tables.
//!
//! All persistent entities are owned by the hosted backend; these structs
//! are read-side projections only.

pub mod enums;
pub mod lab;
pub mod patient;
pub mod screening;
pub mod visit;

pub use enums::{DependencyStatus, LinkageStatus, ScreeningStatus, Sex, VisitChannel};
pub use lab::LabExam;
pub use patient::Patient;
pub use screening::Screening;
pub use visit::Visit;
