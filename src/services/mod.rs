// Service exports
pub mod artifacts;
pub mod flows;
pub mod latency;

pub use artifacts::{Artifact, ArtifactError, ArtifactSink, DirectorySink, MemorySink};
pub use flows::{FlowService, FlowServiceOptions, ServiceError};
pub use latency::SimulatedLatency;
