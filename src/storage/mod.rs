pub mod enrollment_store;

pub use enrollment_store::{EnrollmentRecord, EnrollmentStore};
