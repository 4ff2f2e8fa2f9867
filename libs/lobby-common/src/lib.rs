pub mod expiration;
pub mod model;
pub mod registry;
pub mod throttle;

pub use expiration::ExpirationSet;
pub use model::{Endpoint, GameServer, Transport};
pub use registry::{PutOutcome, ServerRegistry};
pub use throttle::RecentEndpointFilter;
