pub mod area;
pub mod astar;
pub mod los;
pub mod reachable;

pub use area::{apply_area_effect, highlight_tiles, tiles_in_range, EffectPattern};
pub use astar::{find_path, path_cost, PathQuery};
pub use los::{line_between, line_of_sight};
pub use reachable::{reachable_costs, reachable_tiles};
