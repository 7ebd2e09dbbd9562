pub mod config;
pub mod matrix;
pub mod path;
pub mod record;
pub mod topology;
pub mod traffic;

pub use config::{DatanetConfig, DatanetConfigOverride, Intensity};
pub use matrix::{SquareMatrix, exact_side};
pub use path::{Endpoint, PhysicalPathMatrix, PortLabel, RoutingMatrix};
pub use record::{GlobalCounters, PerfRecord, ResultCell, TrafficAggregate, TrafficCell};
pub use topology::{AttrValue, Attrs, Topology};
pub use traffic::{SizeCandidate, SizeDistribution, TimeDistribution, TrafficDescriptor};
