//! Range queries and area effects

use serde::{Deserialize, Serialize};

use crate::grid::battlefield::Battlefield;
use crate::grid::position::{DistanceMetric, GridPos};

/// Footprint of an area effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EffectPattern {
    /// Euclidean disc
    Circle,
    /// Chebyshev square
    Square,
    /// Center tile only
    #[default]
    Point,
}

/// In-bounds tiles within `radius` of `center` under the given metric
pub fn tiles_in_range(
    field: &Battlefield,
    center: GridPos,
    radius: f32,
    metric: DistanceMetric,
) -> Vec<GridPos> {
    if radius < 0.0 {
        return Vec::new();
    }

    let reach = radius.floor() as i32;
    let mut tiles = Vec::new();

    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let pos = GridPos::new(center.x + dx, center.y + dy);
            if field.in_bounds(pos) && center.distance(&pos, metric) <= radius {
                tiles.push(pos);
            }
        }
    }

    tiles
}

/// Tag every tile in the pattern's footprint with an effect
///
/// Returns the number of tiles touched. Tags are idempotent per tile, so
/// re-applying an effect does not stack.
pub fn apply_area_effect(
    field: &mut Battlefield,
    center: GridPos,
    radius: f32,
    tag: &str,
    pattern: EffectPattern,
) -> usize {
    let targets = match pattern {
        EffectPattern::Circle => tiles_in_range(field, center, radius, DistanceMetric::Euclidean),
        EffectPattern::Square => tiles_in_range(field, center, radius, DistanceMetric::Chebyshev),
        EffectPattern::Point => {
            if field.in_bounds(center) {
                vec![center]
            } else {
                Vec::new()
            }
        }
    };

    for pos in &targets {
        field.add_effect(*pos, tag);
    }
    targets.len()
}

/// Highlight a set of tiles for the UI; returns how many were in bounds
pub fn highlight_tiles(field: &mut Battlefield, tiles: &[GridPos], tag: &str) -> usize {
    tiles
        .iter()
        .filter(|pos| field.set_highlight(**pos, tag))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_radius_two() {
        let field = Battlefield::new(9, 9);
        let center = GridPos::new(4, 4);
        let tiles = tiles_in_range(&field, center, 2.0, DistanceMetric::Euclidean);

        // 13 tiles: the corner offsets (|2|,|1|) fall outside sqrt(5) > 2
        assert_eq!(tiles.len(), 13);
        assert!(tiles.contains(&center));
        assert!(tiles.contains(&GridPos::new(4, 2)));
        assert!(tiles.contains(&GridPos::new(5, 5)));
        assert!(!tiles.contains(&GridPos::new(6, 5)));
    }

    #[test]
    fn test_square_radius_two() {
        let field = Battlefield::new(9, 9);
        let tiles = tiles_in_range(&field, GridPos::new(4, 4), 2.0, DistanceMetric::Chebyshev);
        assert_eq!(tiles.len(), 25);
    }

    #[test]
    fn test_range_clips_to_bounds() {
        let field = Battlefield::new(9, 9);
        let tiles = tiles_in_range(&field, GridPos::new(0, 0), 2.0, DistanceMetric::Chebyshev);
        assert_eq!(tiles.len(), 9);
    }

    #[test]
    fn test_circle_effect_tags_disc() {
        let mut field = Battlefield::new(9, 9);
        let touched =
            apply_area_effect(&mut field, GridPos::new(4, 4), 2.0, "fire", EffectPattern::Circle);
        assert_eq!(touched, 13);

        let tile = field.tile(GridPos::new(4, 2)).unwrap();
        assert!(tile.effects.iter().any(|e| e == "fire"));
        let outside = field.tile(GridPos::new(6, 6)).unwrap();
        assert!(outside.effects.is_empty());
    }

    #[test]
    fn test_point_effect_touches_center_only() {
        let mut field = Battlefield::new(5, 5);
        let touched =
            apply_area_effect(&mut field, GridPos::new(2, 2), 3.0, "smoke", EffectPattern::Point);
        assert_eq!(touched, 1);
        assert!(field.tile(GridPos::new(2, 3)).unwrap().effects.is_empty());
    }

    #[test]
    fn test_reapplying_effect_does_not_stack() {
        let mut field = Battlefield::new(5, 5);
        apply_area_effect(&mut field, GridPos::new(2, 2), 1.0, "fire", EffectPattern::Circle);
        apply_area_effect(&mut field, GridPos::new(2, 2), 1.0, "fire", EffectPattern::Circle);
        assert_eq!(field.tile(GridPos::new(2, 2)).unwrap().effects.len(), 1);
    }

    #[test]
    fn test_highlight_counts_in_bounds_only() {
        let mut field = Battlefield::new(3, 3);
        let tiles = [GridPos::new(0, 0), GridPos::new(5, 5)];
        assert_eq!(highlight_tiles(&mut field, &tiles, "move"), 1);
        assert_eq!(
            field.tile(GridPos::new(0, 0)).unwrap().highlight.as_deref(),
            Some("move")
        );
    }
}
