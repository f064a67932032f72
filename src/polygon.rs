//! Straight-segment analysis and optimal polygon construction for a
//! closed integer contour: prefix sums for O(1) least-squares fits,
//! the longest-straight-subpath table, the penalty-minimizing polygon
//! partition, and least-squares vertex placement.

use crate::geometry::{
    IntPoint, Point, cyclic_index, in_cyclic_range, sign_i, xprod,
};

/// Running sums of x, y, xy, x² and y² over the contour points,
/// translated so the first point is the origin.
#[derive(Debug, Clone, Copy, Default)]
struct Sum {
    x: i64,
    y: i64,
    xy: i64,
    x2: i64,
    y2: i64,
}

/// Prefix-sum table over a contour; entry `i` covers the first `i` points.
#[derive(Debug, Clone)]
pub struct PrefixSums {
    x0: i32,
    y0: i32,
    sums: Vec<Sum>,
}

pub fn prefix_sums(points: &[IntPoint]) -> PrefixSums {
    let x0 = points[0].x;
    let y0 = points[0].y;

    let mut sums = Vec::with_capacity(points.len() + 1);
    sums.push(Sum::default());
    for (i, point) in points.iter().enumerate() {
        let x = (point.x - x0) as i64;
        let y = (point.y - y0) as i64;
        let prev = sums[i];
        sums.push(Sum {
            x: prev.x + x,
            y: prev.y + y,
            xy: prev.xy + x * y,
            x2: prev.x2 + x * x,
            y2: prev.y2 + y * y,
        });
    }

    PrefixSums { x0, y0, sums }
}

/// Direction bucket (0..4) of a unit or sign vector.
fn direction_bucket(dx: i32, dy: i32) -> usize {
    ((3 + 3 * dx + dy) / 2) as usize
}

/// For every index `i`, the furthest index `lon[i]` such that the
/// subpath `i..lon[i]` is straight: its steps stay within half of the
/// eight compass directions and every intermediate point lies within a
/// half-pixel corridor of the chord.
pub fn longest_straight(points: &[IntPoint]) -> Vec<usize> {
    let n = points.len();
    let mut lon = vec![0usize; n];
    let mut pivot = vec![0usize; n];
    let mut next_corner = vec![0usize; n];

    // next_corner[i]: the next index where the path leaves the axis run
    // through point i.
    let mut k = 0usize;
    for i in (0..n).rev() {
        if points[i].x != points[k].x && points[i].y != points[k].y {
            k = i + 1;
        }
        next_corner[i] = k;
    }

    for i in (0..n).rev() {
        let mut count = [0i32; 4];
        let mut constraint = [IntPoint::default(); 2];

        let step = IntPoint::new(
            points[cyclic_index(i as isize + 1, n)].x - points[i].x,
            points[cyclic_index(i as isize + 1, n)].y - points[i].y,
        );
        count[direction_bucket(step.x, step.y)] += 1;

        let mut k = next_corner[i];
        let mut k1 = i;
        let mut found = false;

        loop {
            let dk = IntPoint::new(
                sign_i((points[k].x - points[k1].x) as i64),
                sign_i((points[k].y - points[k1].y) as i64),
            );
            count[direction_bucket(dk.x, dk.y)] += 1;

            // All four quadrant buckets seen: the subpath turned through
            // more than 180 degrees and cannot be straight any further.
            if count[0] != 0 && count[1] != 0 && count[2] != 0 && count[3] != 0 {
                pivot[i] = k1;
                found = true;
                break;
            }

            let cur = IntPoint::new(points[k].x - points[i].x, points[k].y - points[i].y);

            if xprod(constraint[0], cur) < 0 || xprod(constraint[1], cur) > 0 {
                break;
            }

            if cur.x.abs() <= 1 && cur.y.abs() <= 1 {
                // Still within the immediate neighborhood; no constraint.
            } else {
                let off = IntPoint::new(
                    cur.x + if cur.y >= 0 && (cur.y > 0 || cur.x < 0) { 1 } else { -1 },
                    cur.y + if cur.x <= 0 && (cur.x < 0 || cur.y < 0) { 1 } else { -1 },
                );
                if xprod(constraint[0], off) >= 0 {
                    constraint[0] = off;
                }
                let off = IntPoint::new(
                    cur.x + if cur.y <= 0 && (cur.y < 0 || cur.x < 0) { 1 } else { -1 },
                    cur.y + if cur.x >= 0 && (cur.x > 0 || cur.y < 0) { 1 } else { -1 },
                );
                if xprod(constraint[1], off) <= 0 {
                    constraint[1] = off;
                }
            }

            k1 = k;
            k = next_corner[k1];
            if !in_cyclic_range(k, i, k1) {
                break;
            }
        }

        if !found {
            // The constraint broke between k1 and k: walk as far along the
            // final run as the constraint cone allows.
            let dk = IntPoint::new(
                sign_i((points[k].x - points[k1].x) as i64),
                sign_i((points[k].y - points[k1].y) as i64),
            );
            let cur = IntPoint::new(points[k1].x - points[i].x, points[k1].y - points[i].y);

            let a = xprod(constraint[0], cur);
            let b = xprod(constraint[0], dk);
            let c = xprod(constraint[1], cur);
            let d = xprod(constraint[1], dk);

            let mut j: i64 = 10_000_000;
            if b < 0 {
                j = a.div_euclid(-b);
            }
            if d > 0 {
                j = j.min((-c).div_euclid(d));
            }
            pivot[i] = cyclic_index(k1 as isize + j as isize, n);
        }
    }

    // Clean up: lon[i] is the furthest straight endpoint, made cyclically
    // monotonic over the closed contour.
    let mut j = pivot[n - 1];
    lon[n - 1] = j;
    for i in (0..n - 1).rev() {
        if in_cyclic_range(i + 1, pivot[i], j) {
            j = pivot[i];
        }
        lon[i] = j;
    }

    let mut i = n as isize - 1;
    while i >= 0 && in_cyclic_range(cyclic_index(i + 1, n), j, lon[i as usize]) {
        lon[i as usize] = j;
        i -= 1;
    }

    lon
}

/// Penalty of approximating the subpath `i..j` by the chord through its
/// endpoints: the root of the summed squared distances, in closed form
/// from the prefix sums. `j` may exceed `n` to denote wrap-around.
fn chord_penalty(points: &[IntPoint], sums: &PrefixSums, i: usize, j: usize) -> f64 {
    let n = points.len();
    let s = &sums.sums;

    let (j, x, y, x2, xy, y2, k) = if j >= n {
        let j = j - n;
        (
            j,
            (s[j + 1].x - s[i].x + s[n].x) as f64,
            (s[j + 1].y - s[i].y + s[n].y) as f64,
            (s[j + 1].x2 - s[i].x2 + s[n].x2) as f64,
            (s[j + 1].xy - s[i].xy + s[n].xy) as f64,
            (s[j + 1].y2 - s[i].y2 + s[n].y2) as f64,
            (j + 1 + n - i) as f64,
        )
    } else {
        (
            j,
            (s[j + 1].x - s[i].x) as f64,
            (s[j + 1].y - s[i].y) as f64,
            (s[j + 1].x2 - s[i].x2) as f64,
            (s[j + 1].xy - s[i].xy) as f64,
            (s[j + 1].y2 - s[i].y2) as f64,
            (j + 1 - i) as f64,
        )
    };

    let px = (points[i].x + points[j].x) as f64 / 2.0 - points[0].x as f64;
    let py = (points[i].y + points[j].y) as f64 / 2.0 - points[0].y as f64;
    let ey = (points[j].x - points[i].x) as f64;
    let ex = -((points[j].y - points[i].y) as f64);

    let a = (x2 - 2.0 * x * px) / k + px * px;
    let b = (xy - x * py - y * px) / k + px * py;
    let c = (y2 - 2.0 * y * py) / k + py * py;

    (ex * ex * a + 2.0 * ex * ey * b + ey * ey * c).sqrt()
}

/// Optimal polygon: the partition of the contour into the fewest chords
/// of minimal total penalty, subject to every chord being straight per
/// `lon`. Returns the sorted vertex indices into the contour.
pub fn best_polygon(points: &[IntPoint], sums: &PrefixSums, lon: &[usize]) -> Vec<usize> {
    let n = points.len();

    // clip0[i]: furthest index reachable from i in one chord.
    let mut clip0 = vec![0usize; n];
    for i in 0..n {
        let mut c = cyclic_index(lon[cyclic_index(i as isize - 1, n)] as isize - 1, n);
        if c == i {
            c = cyclic_index(i as isize + 1, n);
        }
        clip0[i] = if c < i { n } else { c };
    }

    // clip1[j]: earliest index from which j is reachable in one chord.
    let mut clip1 = vec![0usize; n + 1];
    let mut j = 1usize;
    for i in 0..n {
        while j <= clip0[i] {
            clip1[j] = i;
            j += 1;
        }
    }

    // seg0/seg1 bound how many chords any partition needs.
    let mut seg0 = vec![0usize; n + 1];
    let mut i = 0usize;
    let mut m = 0usize;
    while i < n {
        seg0[m] = i;
        i = clip0[i];
        m += 1;
    }
    seg0[m] = n;

    let mut seg1 = vec![0usize; n + 1];
    let mut i = n;
    for j in (1..=m).rev() {
        seg1[j] = i;
        i = clip1[i];
    }
    seg1[0] = 0;

    // Penalty-minimizing DP over admissible chord partitions.
    let mut pen = vec![0.0f64; n + 1];
    let mut prev = vec![0usize; n + 1];

    for j in 1..=m {
        for i in seg1[j]..=seg0[j] {
            let mut best = -1.0f64;
            for k in (clip1[i]..=seg0[j - 1]).rev() {
                let this_pen = chord_penalty(points, sums, k, i) + pen[k];
                if best < 0.0 || this_pen < best {
                    prev[i] = k;
                    best = this_pen;
                }
            }
            pen[i] = best;
        }
    }

    let mut polygon = vec![0usize; m];
    let mut i = n;
    for j in (0..m).rev() {
        i = prev[i];
        polygon[j] = i;
    }

    polygon
}

/// Symmetric 3x3 quadratic form accumulated over line constraints.
#[derive(Debug, Clone, Copy, Default)]
struct Quad {
    data: [f64; 9],
}

impl Quad {
    fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i * 3 + j]
    }

    /// Evaluate the form at `(w.x, w.y, 1)`.
    fn apply(&self, w: Point) -> f64 {
        let v = [w.x, w.y, 1.0];
        let mut sum = 0.0;
        for i in 0..3 {
            for j in 0..3 {
                sum += v[i] * self.at(i, j) * v[j];
            }
        }
        sum
    }
}

/// Center and direction of the least-squares line through the contour
/// points `i..j` (indices taken cyclically, with wrap bookkeeping).
fn point_slope(points: &[IntPoint], sums: &PrefixSums, i: isize, j: isize) -> (Point, Point) {
    let n = points.len() as isize;
    let s = &sums.sums;

    let mut i = i;
    let mut j = j;
    let mut r: i64 = 0;
    while j >= n {
        j -= n;
        r += 1;
    }
    while i >= n {
        i -= n;
        r -= 1;
    }
    while j < 0 {
        j += n;
        r -= 1;
    }
    while i < 0 {
        i += n;
        r += 1;
    }
    let (i, j) = (i as usize, j as usize);
    let sn = s[n as usize];

    let x = (s[j + 1].x - s[i].x + r * sn.x) as f64;
    let y = (s[j + 1].y - s[i].y + r * sn.y) as f64;
    let x2 = (s[j + 1].x2 - s[i].x2 + r * sn.x2) as f64;
    let xy = (s[j + 1].xy - s[i].xy + r * sn.xy) as f64;
    let y2 = (s[j + 1].y2 - s[i].y2 + r * sn.y2) as f64;
    let k = (j as i64 + 1 - i as i64 + r * n as i64) as f64;

    let ctr = Point::new(x / k, y / k);

    let mut a = (x2 - x * x / k) / k;
    let b = (xy - x * y / k) / k;
    let mut c = (y2 - y * y / k) / k;

    // Larger eigenvalue of the covariance matrix; its eigenvector is the
    // line direction.
    let lambda2 = (a + c + ((a - c) * (a - c) + 4.0 * b * b).sqrt()) / 2.0;
    a -= lambda2;
    c -= lambda2;

    let mut dir = Point::new(0.0, 0.0);
    let l;
    if a.abs() >= c.abs() {
        l = (a * a + b * b).sqrt();
        if l != 0.0 {
            dir = Point::new(-b / l, a / l);
        }
    } else {
        l = (c * c + b * b).sqrt();
        if l != 0.0 {
            dir = Point::new(-c / l, b / l);
        }
    }

    (ctr, dir)
}

/// Place each polygon vertex at the point minimizing the summed squared
/// distance to the least-squares lines of its two adjacent segments,
/// clamped to the unit square around the original corner.
pub fn adjust_vertices(points: &[IntPoint], sums: &PrefixSums, polygon: &[usize]) -> Vec<Point> {
    let m = polygon.len();
    let n = points.len();
    let x0 = sums.x0 as f64;
    let y0 = sums.y0 as f64;

    let mut ctr = vec![Point::default(); m];
    let mut dir = vec![Point::default(); m];
    for i in 0..m {
        let j = polygon[cyclic_index(i as isize + 1, m)];
        let j = cyclic_index(j as isize - polygon[i] as isize, n) + polygon[i];
        let (c, d) = point_slope(points, sums, polygon[i] as isize, j as isize);
        ctr[i] = c;
        dir[i] = d;
    }

    // One quadratic form per segment: squared distance to its line.
    let mut q = vec![Quad::default(); m];
    for i in 0..m {
        let d = dir[i].x * dir[i].x + dir[i].y * dir[i].y;
        if d != 0.0 {
            let v = [dir[i].y, -dir[i].x, dir[i].x * ctr[i].y - dir[i].y * ctr[i].x];
            for l in 0..3 {
                for k in 0..3 {
                    q[i].data[l * 3 + k] = v[l] * v[k] / d;
                }
            }
        }
    }

    let mut vertices = Vec::with_capacity(m);

    for i in 0..m {
        let s = Point::new(
            (points[polygon[i]].x as f64) - x0,
            (points[polygon[i]].y as f64) - y0,
        );

        let j = cyclic_index(i as isize - 1, m);
        let mut quad = Quad::default();
        for l in 0..3 {
            for k in 0..3 {
                quad.data[l * 3 + k] = q[j].at(l, k) + q[i].at(l, k);
            }
        }

        let w = loop {
            let det = quad.at(0, 0) * quad.at(1, 1) - quad.at(0, 1) * quad.at(1, 0);
            if det != 0.0 {
                break Point::new(
                    (-quad.at(0, 2) * quad.at(1, 1) + quad.at(1, 2) * quad.at(0, 1)) / det,
                    (quad.at(0, 2) * quad.at(1, 0) - quad.at(1, 2) * quad.at(0, 0)) / det,
                );
            }

            // Singular form: constrain toward the corner and retry.
            let v = if quad.at(0, 0) > quad.at(1, 1) {
                [-quad.at(0, 1), quad.at(0, 0), 0.0]
            } else if quad.at(1, 1) != 0.0 {
                [-quad.at(1, 1), quad.at(1, 0), 0.0]
            } else {
                [1.0, 0.0, 0.0]
            };
            let d = v[0] * v[0] + v[1] * v[1];
            let v = [v[0], v[1], -v[1] * s.y - v[0] * s.x];
            for l in 0..3 {
                for k in 0..3 {
                    quad.data[l * 3 + k] += v[l] * v[k] / d;
                }
            }
        };

        if (w.x - s.x).abs() <= 0.5 && (w.y - s.y).abs() <= 0.5 {
            vertices.push(Point::new(w.x + x0, w.y + y0));
            continue;
        }

        // The unconstrained minimum left the unit square; search its
        // edges and corners for the best admissible point.
        let mut min = quad.apply(s);
        let mut best = s;

        if quad.at(0, 0) != 0.0 {
            for z in 0..2 {
                let wy = s.y - 0.5 + z as f64;
                let wx = -(quad.at(0, 1) * wy + quad.at(0, 2)) / quad.at(0, 0);
                let candidate = Point::new(wx, wy);
                let value = quad.apply(candidate);
                if (wx - s.x).abs() <= 0.5 && value < min {
                    min = value;
                    best = candidate;
                }
            }
        }

        if quad.at(1, 1) != 0.0 {
            for z in 0..2 {
                let wx = s.x - 0.5 + z as f64;
                let wy = -(quad.at(1, 0) * wx + quad.at(1, 2)) / quad.at(1, 1);
                let candidate = Point::new(wx, wy);
                let value = quad.apply(candidate);
                if (wy - s.y).abs() <= 0.5 && value < min {
                    min = value;
                    best = candidate;
                }
            }
        }

        for l in 0..2 {
            for k in 0..2 {
                let candidate = Point::new(s.x - 0.5 + l as f64, s.y - 0.5 + k as f64);
                let value = quad.apply(candidate);
                if value < min {
                    min = value;
                    best = candidate;
                }
            }
        }

        vertices.push(Point::new(best.x + x0, best.y + y0));
    }

    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::decompose::{Decomposer, TurnPolicy};

    fn square_contour(size: u32) -> Vec<IntPoint> {
        let bitmap = Bitmap::new(size, size).copy_map(|_| 1);
        let contours = Decomposer::new(bitmap, TurnPolicy::Minority, 0).decompose();
        contours.into_iter().next().unwrap().points
    }

    #[test]
    fn test_prefix_sums_totals() {
        let points = square_contour(3);
        let sums = prefix_sums(&points);
        let n = points.len();
        let x0 = points[0].x;
        let manual: i64 = points.iter().map(|p| (p.x - x0) as i64).sum();
        assert_eq!(sums.sums[n].x, manual);
    }

    #[test]
    fn test_longest_straight_spans_square_edges() {
        let points = square_contour(4);
        let lon = longest_straight(&points);
        assert_eq!(lon.len(), points.len());
        // From a corner, the straight subpath must reach at least the
        // full following edge.
        for i in 0..points.len() {
            let reach = (lon[i] + points.len() - i) % points.len();
            assert!(reach >= 1);
        }
    }

    #[test]
    fn test_best_polygon_of_square_has_four_vertices() {
        let points = square_contour(4);
        let sums = prefix_sums(&points);
        let lon = longest_straight(&points);
        let polygon = best_polygon(&points, &sums, &lon);
        assert_eq!(polygon.len(), 4);
        for pair in polygon.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        // Each polygon vertex must sit on an actual corner of the square.
        for &index in &polygon {
            let p = points[index];
            assert!(p.x == 0 || p.x == 4);
            assert!(p.y == 0 || p.y == 4);
        }
    }

    #[test]
    fn test_adjusted_vertices_near_square_corners() {
        let points = square_contour(4);
        let sums = prefix_sums(&points);
        let lon = longest_straight(&points);
        let polygon = best_polygon(&points, &sums, &lon);
        let vertices = adjust_vertices(&points, &sums, &polygon);
        assert_eq!(vertices.len(), polygon.len());
        for (vertex, &index) in vertices.iter().zip(&polygon) {
            let corner = points[index];
            assert!((vertex.x - corner.x as f64).abs() <= 0.5 + 1e-9);
            assert!((vertex.y - corner.y as f64).abs() <= 0.5 + 1e-9);
        }
    }
}
