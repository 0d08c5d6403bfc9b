use serde::{Deserialize, Serialize};

use super::Position;

/// Axis-aligned rectangle in which combat may not be started.
///
/// Bounds are inclusive on every edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SafeZone {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square zone of side `2 * radius` centred on `center`.
    pub fn around(center: Position, radius: f64) -> Self {
        Self::new(
            center.x - radius,
            center.y - radius,
            radius * 2.0,
            radius * 2.0,
        )
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.x >= self.x
            && position.x <= self.x + self.width
            && position.y >= self.y
            && position.y <= self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive_on_every_edge() {
        let zone = SafeZone::new(10.0, 20.0, 30.0, 40.0);

        assert!(zone.contains(&Position::new(10.0, 20.0)));
        assert!(zone.contains(&Position::new(40.0, 60.0)));
        assert!(zone.contains(&Position::new(10.0, 60.0)));
        assert!(zone.contains(&Position::new(25.0, 35.0)));

        assert!(!zone.contains(&Position::new(9.999, 30.0)));
        assert!(!zone.contains(&Position::new(25.0, 60.001)));
    }

    #[test]
    fn around_centres_the_zone() {
        let zone = SafeZone::around(Position::new(100.0, 100.0), 25.0);
        assert_eq!(zone, SafeZone::new(75.0, 75.0, 50.0, 50.0));
    }
}
