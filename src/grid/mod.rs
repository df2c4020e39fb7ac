pub mod battlefield;
pub mod manager;
pub mod position;
pub mod terrain;
pub mod tile;

pub use battlefield::{Battlefield, BattlefieldSnapshot, GridSize, PathKey, TileSnapshot};
pub use manager::SpatialGrid;
pub use position::{DistanceMetric, GridPos};
pub use terrain::Terrain;
pub use tile::{Tile, TileStatus};
