//! Contour decomposition: walks the boundaries of a binary bitmap and
//! yields signed closed integer contours, erasing each traced region by
//! XOR so inner boundaries surface on later scans.

use crate::bitmap::Bitmap;
use crate::geometry::IntPoint;
use serde::{Deserialize, Serialize};

/// Rule resolving ambiguous boundary crossings, where the path could turn
/// either way between two diagonal foreground pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPolicy {
    Black,
    White,
    Left,
    Right,
    #[default]
    Minority,
    Majority,
}

/// Orientation marker: `Plus` for contours that start on a pixel that was
/// foreground in the original binary map, `Minus` for hole boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// Closed integer contour produced by decomposition. Consecutive points
/// differ by a unit step along one axis; the first point implicitly
/// repeats at the end.
#[derive(Debug, Clone)]
pub struct Contour {
    pub points: Vec<IntPoint>,
    pub area: i64,
    pub sign: Sign,
    pub min: IntPoint,
    pub max: IntPoint,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Edge-following decomposer over a working copy of the binary bitmap.
/// The original map is kept aside to classify contour signs after the
/// working copy has been XOR-erased.
pub struct Decomposer {
    map: Bitmap,
    source: Bitmap,
    turn_policy: TurnPolicy,
    turd_size: u32,
    cursor: usize,
}

impl Decomposer {
    pub fn new(binary: Bitmap, turn_policy: TurnPolicy, turd_size: u32) -> Self {
        Decomposer {
            map: binary.clone(),
            source: binary,
            turn_policy,
            turd_size,
            cursor: 0,
        }
    }

    /// Extract all contours with enclosed area above the turd size.
    pub fn decompose(mut self) -> Vec<Contour> {
        let mut contours = Vec::new();

        while let Some(start) = self.find_next() {
            let contour = self.find_path(start);
            self.xor_path(&contour);

            if contour.area > self.turd_size as i64 {
                contours.push(contour);
            }
        }

        contours
    }

    /// Next remaining foreground pixel in row-major order.
    fn find_next(&mut self) -> Option<IntPoint> {
        while self.cursor < self.map.size() {
            if self.map.data()[self.cursor] != 0 {
                return Some(self.map.index_to_point(self.cursor));
            }
            self.cursor += 1;
        }
        None
    }

    /// Majority color in expanding square neighborhoods around `(x, y)`.
    fn majority(&self, x: i32, y: i32) -> bool {
        for i in 2..5 {
            let mut tally = 0i32;
            for a in -i + 1..=i - 1 {
                tally += if self.map.get(x + a, y + i - 1) != 0 { 1 } else { -1 };
                tally += if self.map.get(x + i - 1, y + a - 1) != 0 { 1 } else { -1 };
                tally += if self.map.get(x + a - 1, y - i) != 0 { 1 } else { -1 };
                tally += if self.map.get(x - i, y + a) != 0 { 1 } else { -1 };
            }
            if tally > 0 {
                return true;
            } else if tally < 0 {
                return false;
            }
        }
        false
    }

    fn turns_right(&self, sign: Sign, x: i32, y: i32) -> bool {
        match self.turn_policy {
            TurnPolicy::Right => true,
            TurnPolicy::Left => false,
            TurnPolicy::Black => sign == Sign::Plus,
            TurnPolicy::White => sign == Sign::Minus,
            TurnPolicy::Majority => self.majority(x, y),
            TurnPolicy::Minority => !self.majority(x, y),
        }
    }

    /// Follow the boundary starting at `start` until the walk returns to
    /// its starting corner, accumulating points, bounds and signed area.
    fn find_path(&self, start: IntPoint) -> Contour {
        let mut points = Vec::new();
        let mut x = start.x;
        let mut y = start.y;
        let mut dirx = 0i32;
        let mut diry = 1i32;
        let mut area = 0i64;
        let mut min = start;
        let mut max = start;

        let sign = if self.source.get(start.x, start.y) != 0 {
            Sign::Plus
        } else {
            Sign::Minus
        };

        loop {
            points.push(IntPoint::new(x, y));
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            max.x = max.x.max(x);
            max.y = max.y.max(y);

            x += dirx;
            y += diry;
            area -= x as i64 * diry as i64;

            // The two pixels diagonally ahead relative to the direction of
            // travel; out-of-range reads count as background.
            let left = self.map.get(x + (dirx + diry - 1) / 2, y + (diry - dirx - 1) / 2);
            let right = self.map.get(x + (dirx - diry - 1) / 2, y + (diry + dirx - 1) / 2);

            if right != 0 && left == 0 {
                if self.turns_right(sign, x, y) {
                    let tmp = dirx;
                    dirx = -diry;
                    diry = tmp;
                } else {
                    let tmp = dirx;
                    dirx = diry;
                    diry = -tmp;
                }
            } else if right != 0 {
                let tmp = dirx;
                dirx = -diry;
                diry = tmp;
            } else if left == 0 {
                let tmp = dirx;
                dirx = diry;
                diry = -tmp;
            }

            // Closed only when back at the start corner heading in the
            // start direction again; merely re-crossing the corner while
            // traveling another way keeps the walk going.
            if x == start.x && y == start.y && dirx == 0 && diry == 1 {
                break;
            }
        }

        Contour {
            points,
            area,
            sign,
            min,
            max,
        }
    }

    /// Flip every pixel between the contour's vertical boundary edges and
    /// its bounding column, erasing the traced interior from the working
    /// map and exposing nested boundaries as fresh foreground.
    fn xor_path(&mut self, contour: &Contour) {
        let mut y1 = contour.points[0].y;
        let max_x = contour.max.x;

        for point in &contour.points[1..] {
            let (x, y) = (point.x, point.y);
            if y != y1 {
                let row = y1.min(y);
                for j in x..max_x {
                    let value = self.map.get(j, row);
                    self.map.set(j as u32, row as u32, 1 - value);
                }
                y1 = y;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(width: u32, height: u32, foreground: &[(u32, u32)]) -> Bitmap {
        let mut bitmap = Bitmap::new(width, height);
        for &(x, y) in foreground {
            bitmap.set(x, y, 1);
        }
        bitmap
    }

    fn full(width: u32, height: u32) -> Bitmap {
        Bitmap::new(width, height).copy_map(|_| 1)
    }

    #[test]
    fn test_full_square_single_contour() {
        let contours = Decomposer::new(full(2, 2), TurnPolicy::Minority, 0).decompose();
        assert_eq!(contours.len(), 1);
        let contour = &contours[0];
        assert_eq!(contour.area, 4);
        assert_eq!(contour.sign, Sign::Plus);
        assert_eq!(contour.len(), 8);
        assert_eq!(contour.min, IntPoint::new(0, 0));
        assert_eq!(contour.max, IntPoint::new(2, 2));
    }

    #[test]
    fn test_contour_points_are_unit_steps() {
        let contours = Decomposer::new(full(3, 2), TurnPolicy::Minority, 0).decompose();
        let points = &contours[0].points;
        for i in 0..points.len() {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            let step = (a.x - b.x).abs() + (a.y - b.y).abs();
            assert_eq!(step, 1);
        }
    }

    #[test]
    fn test_empty_bitmap_yields_nothing() {
        let contours = Decomposer::new(Bitmap::new(4, 4), TurnPolicy::Minority, 0).decompose();
        assert!(contours.is_empty());
    }

    #[test]
    fn test_hole_becomes_negative_contour() {
        // 4x4 ring: outer boundary plus a 2x2 hole.
        let mut bitmap = full(4, 4);
        bitmap.set(1, 1, 0);
        bitmap.set(2, 1, 0);
        bitmap.set(1, 2, 0);
        bitmap.set(2, 2, 0);

        let contours = Decomposer::new(bitmap, TurnPolicy::Minority, 0).decompose();
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].sign, Sign::Plus);
        assert_eq!(contours[0].area, 16);
        assert_eq!(contours[1].sign, Sign::Minus);
        assert_eq!(contours[1].area, 4);
    }

    #[test]
    fn test_turd_size_culls_small_contours() {
        let lone = binary(4, 4, &[(1, 1)]);
        let kept = Decomposer::new(lone.clone(), TurnPolicy::Minority, 0).decompose();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].area, 1);

        let culled = Decomposer::new(lone, TurnPolicy::Minority, 2).decompose();
        assert!(culled.is_empty());
    }

    #[test]
    fn test_turd_size_monotonicity() {
        let mut bitmap = full(3, 3);
        bitmap.set(2, 2, 0);
        let mut previous = usize::MAX;
        for turd_size in 0..10 {
            let count = Decomposer::new(bitmap.clone(), TurnPolicy::Minority, turd_size)
                .decompose()
                .len();
            assert!(count <= previous);
            previous = count;
        }
    }

    #[test]
    fn test_turn_policy_resolves_diagonal() {
        // Two diagonal pixels: turning right merges them into one contour,
        // turning left keeps them separate.
        let diagonal = binary(2, 2, &[(0, 0), (1, 1)]);

        let merged = Decomposer::new(diagonal.clone(), TurnPolicy::Right, 0).decompose();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].area, 2);

        let split = Decomposer::new(diagonal.clone(), TurnPolicy::Left, 0).decompose();
        assert_eq!(split.len(), 2);

        // On a sparse background the minority color is foreground, so the
        // minority policy also merges.
        let minority = Decomposer::new(diagonal, TurnPolicy::Minority, 0).decompose();
        assert_eq!(minority.len(), 1);
    }
}
