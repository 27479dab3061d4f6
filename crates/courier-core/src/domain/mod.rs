//! Domain model (topic naming, reply envelope, errors).

pub mod envelope;
pub mod errors;
pub mod topic;

pub use self::envelope::Envelope;
pub use self::errors::EndpointError;
pub use self::topic::TopicNamer;
