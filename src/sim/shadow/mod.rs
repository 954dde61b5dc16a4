pub mod aggregate;
pub mod config;
pub mod result;
pub mod sampler;
pub mod scene;
pub mod simulation;
pub mod sun_table;

pub use aggregate::{CancelFlag, ShadowCounter};
pub use config::{SelfShadowing, ShadowConfig};
pub use result::{BuildingShadow, ShadowPoint, ShadowRecord, ShadowResult, SurfaceShadow};
pub use scene::{Exclusion, OccluderScene};
pub use simulation::ShadowSimulation;
pub use sun_table::{Location, SunTable};
