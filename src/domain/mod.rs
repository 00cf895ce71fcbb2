// Domain layer: value graph, models and ports. No traversal logic here.

pub mod model;
pub mod ports;
pub mod value;
