//! Ephemeral layout positions

use crate::config::{is_usable_extent, LayoutConfig};
use crate::graph::Node;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Where a node sits on the board
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Chooses the first position of a node entering the board
#[derive(Debug, Clone)]
pub struct Placement {
    width: f64,
    height: f64,
}

impl Placement {
    /// A side that is not finite and positive falls back to the default extent
    pub fn new(width: f64, height: f64) -> Self {
        let fallback = LayoutConfig::default();
        let side = |value: f64, default: f64, name: &str| {
            if is_usable_extent(value) {
                value
            } else {
                warn!(side = name, value, "unusable layout extent; using default");
                default
            }
        };
        Self {
            width: side(width, fallback.width, "width"),
            height: side(height, fallback.height, "height"),
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(config.width, config.height)
    }

    /// The persisted hint if the node carries one, otherwise a scattered spot
    pub fn initial_position(&self, node: &Node) -> Position {
        node.position_hint()
            .map(|(x, y)| Position::new(x, y))
            .unwrap_or_else(|| self.scatter())
    }

    /// A pseudo-random point inside the extent
    pub fn scatter(&self) -> Position {
        let mut rng = rand::thread_rng();
        Position::new(rng.gen_range(0.0..self.width), rng.gen_range(0.0..self.height))
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::from_config(&LayoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;

    #[test]
    fn hint_wins_over_scatter() {
        let node = Node::new("a", NodeType::Document, "a").with_position_hint(0.0, 42.0);
        assert_eq!(Placement::default().initial_position(&node), Position::new(0.0, 42.0));
    }

    #[test]
    fn scatter_stays_inside_extent() {
        let placement = Placement::new(10.0, 20.0);
        for _ in 0..100 {
            let p = placement.scatter();
            assert!((0.0..10.0).contains(&p.x));
            assert!((0.0..20.0).contains(&p.y));
        }
    }

    #[test]
    fn unusable_extent_falls_back_to_default() {
        let default = LayoutConfig::default();
        let placement = Placement::from_config(&LayoutConfig {
            width: f64::INFINITY,
            height: -5.0,
        });
        let p = placement.scatter();
        assert!((0.0..default.width).contains(&p.x));
        assert!((0.0..default.height).contains(&p.y));
    }
}
