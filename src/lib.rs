pub mod crs;
pub mod error;
pub mod geom;
pub mod io;
pub mod model;
pub mod sim;

// Prelude
pub use error::{ShadowError, SkipReason};
pub use geom::point::Point;
pub use geom::vector::Vector;
pub use model::CityModel;
pub use sim::shadow::{ShadowConfig, ShadowResult, ShadowSimulation};
