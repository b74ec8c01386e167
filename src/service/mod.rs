pub mod backend;
pub mod local;
pub mod protocol;

pub use backend::EnrollmentBackend;
pub use local::LocalBackend;
pub use protocol::{CommitRequest, CredentialToken, CredentialVerification, EnrollmentIdentity, TelemetrySnapshot};
