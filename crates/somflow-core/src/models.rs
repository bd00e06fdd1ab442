pub mod artifact;
pub mod request;
pub mod som;
pub mod workspace;

pub use artifact::{ArtifactKind, PipelineArtifact};
pub use request::{RasterSet, RunRequest};
pub use som::{
    ClusterCounts, Cooling, DecimalText, GridShape, Initialization, MapTopology,
    NeighborhoodFunction, SomConfiguration, SomFiles, SomParameters,
};
pub use workspace::WorkspaceLayout;
