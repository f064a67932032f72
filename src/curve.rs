//! Smoothed curve construction and optional Bézier optimization.
//!
//! Smoothing turns adjusted polygon vertices into a closed sequence of
//! corner and curve segments; optimization then tries to replace runs of
//! curve segments with single fitted cubics, keeping the result within
//! the configured tolerance of the original.

use crate::geometry::{
    Point, area_para, bezier_point, cross4, cyclic_index, distance, dot3, dot4, interval,
    ortho_denom, sign_f, tangent_param,
};

/// Cosine bound for the maximum bend an optimized cubic may span
/// (about 179.91 degrees).
const COS_BEND_LIMIT: f64 = -0.999847695156;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentTag {
    Corner,
    Curve,
}

/// Closed curve over `n` segments. Control points are stored flattened,
/// three per segment; segment `i` ends at `c[3i + 2]`, which doubles as
/// the start point of segment `i + 1`.
#[derive(Debug, Clone)]
pub struct Curve {
    pub tag: Vec<SegmentTag>,
    pub c: Vec<Point>,
    pub vertex: Vec<Point>,
    pub alpha: Vec<f64>,
    pub alpha0: Vec<f64>,
    pub beta: Vec<f64>,
}

impl Curve {
    pub fn new(n: usize) -> Self {
        Curve {
            tag: vec![SegmentTag::Corner; n],
            c: vec![Point::default(); n * 3],
            vertex: vec![Point::default(); n],
            alpha: vec![0.0; n],
            alpha0: vec![0.0; n],
            beta: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_empty()
    }

    /// End point of segment `i`.
    pub fn endpoint(&self, i: usize) -> Point {
        self.c[3 * i + 2]
    }
}

/// Build the smoothed curve over adjusted vertices. Vertices whose local
/// curvature parameter reaches `alpha_max` become corners; the rest get
/// Bézier handles interpolated toward the neighboring midpoints.
pub fn smooth(vertices: &[Point], alpha_max: f64) -> Curve {
    let m = vertices.len();
    let mut curve = Curve::new(m);
    curve.vertex = vertices.to_vec();

    for i in 0..m {
        let j = (i + 1) % m;
        let k = (i + 2) % m;
        let p4 = interval(0.5, vertices[k], vertices[j]);

        let denom = ortho_denom(vertices[i], vertices[k]);
        let alpha = if denom != 0.0 {
            let dd = (area_para(vertices[i], vertices[j], vertices[k]) / denom).abs();
            let raw = if dd > 1.0 { 1.0 - 1.0 / dd } else { 0.0 };
            raw / 0.75
        } else {
            4.0 / 3.0
        };
        curve.alpha0[j] = alpha;

        if alpha >= alpha_max {
            curve.tag[j] = SegmentTag::Corner;
            curve.c[3 * j + 1] = vertices[j];
            curve.c[3 * j + 2] = p4;
            curve.alpha[j] = alpha;
        } else {
            let alpha = alpha.clamp(0.55, 1.0);
            curve.tag[j] = SegmentTag::Curve;
            curve.c[3 * j] = interval(0.5 + 0.5 * alpha, vertices[i], vertices[j]);
            curve.c[3 * j + 1] = interval(0.5 + 0.5 * alpha, vertices[k], vertices[j]);
            curve.c[3 * j + 2] = p4;
            curve.alpha[j] = alpha;
        }
        curve.beta[j] = 0.5;
    }

    curve
}

/// Candidate single-cubic replacement for a run of curve segments.
#[derive(Debug, Clone, Copy, Default)]
struct Fit {
    pen: f64,
    c: [Point; 2],
    t: f64,
    s: f64,
    alpha: f64,
}

/// Try to fit one cubic over segments `i..j` (cyclically). Declines with
/// `None` when the run bends too far, changes convexity, hits a corner,
/// degenerates numerically, or strays beyond `tolerance`.
#[allow(clippy::needless_range_loop)]
fn fit_run(
    curve: &Curve,
    i: usize,
    j: usize,
    tolerance: f64,
    convexity: &[i32],
    area: &[f64],
) -> Option<Fit> {
    let m = curve.len();
    let vertex = &curve.vertex;

    if i == j {
        return None;
    }

    let i1 = (i + 1) % m;
    let mut k = i;
    let mut k1 = (k + 1) % m;
    let conv = convexity[k1];
    if conv == 0 {
        return None;
    }

    let d = distance(vertex[i], vertex[i1]);
    k = k1;
    while k != j {
        k1 = (k + 1) % m;
        let k2 = (k + 2) % m;
        if convexity[k1] != conv {
            return None;
        }
        if sign_f(cross4(vertex[i], vertex[i1], vertex[k1], vertex[k2])) != conv {
            return None;
        }
        if dot4(vertex[i], vertex[i1], vertex[k1], vertex[k2])
            < d * distance(vertex[k1], vertex[k2]) * COS_BEND_LIMIT
        {
            return None;
        }
        k = k1;
    }

    let p0 = curve.c[(i % m) * 3 + 2];
    let mut p1 = vertex[(i + 1) % m];
    let mut p2 = vertex[j % m];
    let p3 = curve.c[(j % m) * 3 + 2];

    // Signed area enclosed by the original run over the chord.
    let mut run_area = area[j] - area[i];
    run_area -= area_para(vertex[0], curve.c[i * 3 + 2], curve.c[j * 3 + 2]) / 2.0;
    if i >= j {
        run_area += area[m];
    }

    // Intersection of the end tangents parameterized along each of them.
    let a1 = area_para(p0, p1, p2);
    let a2 = area_para(p0, p1, p3);
    let a3 = area_para(p0, p2, p3);
    let a4 = a1 + a3 - a2;

    if a2 == a1 {
        return None;
    }

    let t = a3 / (a3 - a4);
    let s = a2 / (a2 - a1);
    let a = a2 * t / 2.0;

    if a == 0.0 || !t.is_finite() || !s.is_finite() {
        return None;
    }

    // Choose the handle extension so the cubic encloses the same area
    // as the original run.
    let relative = run_area / a;
    let discriminant = 4.0 - relative / 0.3;
    if discriminant < 0.0 {
        return None;
    }
    let alpha = 2.0 - discriminant.sqrt();

    let mut fit = Fit {
        pen: 0.0,
        c: [interval(t * alpha, p0, p1), interval(s * alpha, p3, p2)],
        t,
        s,
        alpha,
    };

    p1 = fit.c[0];
    p2 = fit.c[1];

    // Verify the fit stays within tolerance of every original vertex
    // edge, measured at the matching tangent parameter.
    let mut k = (i + 1) % m;
    while k != j {
        let k1 = (k + 1) % m;
        let t = tangent_param(p0, p1, p2, p3, vertex[k], vertex[k1]);
        if t < -0.5 {
            return None;
        }
        let pt = bezier_point(t, p0, p1, p2, p3);
        let d = distance(vertex[k], vertex[k1]);
        if d == 0.0 {
            return None;
        }
        let d1 = area_para(vertex[k], vertex[k1], pt) / d;
        if d1.abs() > tolerance {
            return None;
        }
        if dot3(vertex[k], vertex[k1], pt) < 0.0 || dot3(vertex[k1], vertex[k], pt) < 0.0 {
            return None;
        }
        fit.pen += d1 * d1;
        k = k1;
    }

    // And within tolerance of the original control polygon.
    let mut k = i;
    while k != j {
        let k1 = (k + 1) % m;
        let t = tangent_param(p0, p1, p2, p3, curve.c[k * 3 + 2], curve.c[k1 * 3 + 2]);
        if t < -0.5 {
            return None;
        }
        let pt = bezier_point(t, p0, p1, p2, p3);
        let d = distance(curve.c[k * 3 + 2], curve.c[k1 * 3 + 2]);
        if d == 0.0 {
            return None;
        }
        let mut d1 = area_para(curve.c[k * 3 + 2], curve.c[k1 * 3 + 2], pt) / d;
        let mut d2 = area_para(curve.c[k * 3 + 2], curve.c[k1 * 3 + 2], vertex[k1]) / d;
        d2 *= 0.75 * curve.alpha[k1];
        if d2 < 0.0 {
            d1 = -d1;
            d2 = -d2;
        }
        if d1 < d2 - tolerance {
            return None;
        }
        if d1 < d2 {
            fit.pen += (d1 - d2) * (d1 - d2);
        }
        k = k1;
    }

    Some(fit)
}

/// Replace maximal runs of curve segments with single fitted cubics where
/// that stays within `tolerance`. Minimizes segment count first, then the
/// accumulated penalty.
pub fn optimize_curve(curve: &Curve, tolerance: f64) -> Curve {
    let m = curve.len();

    // Convexity per segment: turn direction at curve vertices, 0 at corners.
    let mut convexity = vec![0i32; m];
    for i in 0..m {
        if curve.tag[i] == SegmentTag::Curve {
            convexity[i] = sign_f(area_para(
                curve.vertex[cyclic_index(i as isize - 1, m)],
                curve.vertex[i],
                curve.vertex[(i + 1) % m],
            ));
        }
    }

    // Cumulative signed areas for O(1) run-area queries.
    let mut area = vec![0.0f64; m + 1];
    let mut running = 0.0;
    let p0 = curve.vertex[0];
    for i in 0..m {
        let i1 = (i + 1) % m;
        if curve.tag[i1] == SegmentTag::Curve {
            let alpha = curve.alpha[i1];
            running += 0.3 * alpha * (4.0 - alpha)
                * area_para(curve.c[i * 3 + 2], curve.vertex[i1], curve.c[i1 * 3 + 2])
                / 2.0;
            running += area_para(p0, curve.c[i * 3 + 2], curve.c[i1 * 3 + 2]) / 2.0;
        }
        area[i + 1] = running;
    }

    let mut pt = vec![0usize; m + 1];
    let mut pen = vec![0.0f64; m + 1];
    let mut len = vec![0usize; m + 1];
    let mut fits: Vec<Option<Fit>> = vec![None; m + 1];

    for j in 1..=m {
        pt[j] = j - 1;
        pen[j] = pen[j - 1];
        len[j] = len[j - 1] + 1;
        fits[j] = None;

        for i in (0..j.saturating_sub(1)).rev() {
            let Some(fit) = fit_run(curve, i, j % m, tolerance, &convexity, &area) else {
                break;
            };
            if len[j] > len[i] + 1 || (len[j] == len[i] + 1 && pen[j] > pen[i] + fit.pen) {
                pt[j] = i;
                pen[j] = pen[i] + fit.pen;
                len[j] = len[i] + 1;
                fits[j] = Some(fit);
            }
        }
    }

    let om = len[m];
    let mut optimized = Curve::new(om);
    let mut s = vec![0.0f64; om];
    let mut t = vec![0.0f64; om];

    let mut j = m;
    for i in (0..om).rev() {
        if pt[j] == j - 1 {
            let jm = j % m;
            optimized.tag[i] = curve.tag[jm];
            optimized.c[i * 3] = curve.c[jm * 3];
            optimized.c[i * 3 + 1] = curve.c[jm * 3 + 1];
            optimized.c[i * 3 + 2] = curve.c[jm * 3 + 2];
            optimized.vertex[i] = curve.vertex[jm];
            optimized.alpha[i] = curve.alpha[jm];
            optimized.alpha0[i] = curve.alpha0[jm];
            s[i] = 1.0;
            t[i] = 1.0;
        } else {
            let jm = j % m;
            let fit = fits[j].expect("accepted fit recorded by the optimization pass");
            optimized.tag[i] = SegmentTag::Curve;
            optimized.c[i * 3] = fit.c[0];
            optimized.c[i * 3 + 1] = fit.c[1];
            optimized.c[i * 3 + 2] = curve.c[jm * 3 + 2];
            optimized.vertex[i] = interval(fit.s, curve.c[jm * 3 + 2], curve.vertex[jm]);
            optimized.alpha[i] = fit.alpha;
            optimized.alpha0[i] = fit.alpha;
            s[i] = fit.s;
            t[i] = fit.t;
        }
        j = pt[j];
    }

    for i in 0..om {
        optimized.beta[i] = s[i] / (s[i] + t[(i + 1) % om]);
    }

    optimized
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Square large enough that its corners exceed the default corner
    /// threshold (the curvature parameter grows with side length).
    fn square_vertices() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(16.0, 0.0),
            Point::new(16.0, 16.0),
            Point::new(0.0, 16.0),
        ]
    }

    /// Regular polygon approximating a circle.
    fn polygon_vertices(sides: usize, radius: f64) -> Vec<Point> {
        (0..sides)
            .map(|i| {
                let angle = i as f64 / sides as f64 * std::f64::consts::TAU;
                Point::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect()
    }

    #[test]
    fn test_smooth_square_is_all_corners() {
        let curve = smooth(&square_vertices(), 1.0);
        assert_eq!(curve.len(), 4);
        assert!(curve.tag.iter().all(|&t| t == SegmentTag::Corner));
        for i in 0..4 {
            assert_eq!(curve.c[3 * i + 1], curve.vertex[i]);
            assert_eq!(curve.beta[i], 0.5);
        }
    }

    #[test]
    fn test_smooth_square_with_high_alpha_max_is_all_curves() {
        let curve = smooth(&square_vertices(), 4.0 / 3.0);
        assert!(curve.tag.iter().all(|&t| t == SegmentTag::Curve));
        for i in 0..4 {
            assert!(curve.alpha[i] >= 0.55 && curve.alpha[i] <= 1.0);
        }
    }

    #[test]
    fn test_smooth_octagon_is_all_curves() {
        let curve = smooth(&polygon_vertices(8, 10.0), 1.0);
        assert!(curve.tag.iter().all(|&t| t == SegmentTag::Curve));
    }

    #[test]
    fn test_curve_segment_endpoints_chain() {
        let curve = smooth(&polygon_vertices(8, 10.0), 1.0);
        let m = curve.len();
        for i in 0..m {
            // Segment i ends at the midpoint of vertices i and i+1; the
            // next segment continues from there.
            let end = curve.endpoint(i);
            let mid = interval(0.5, curve.vertex[(i + 1) % m], curve.vertex[i]);
            assert!((end.x - mid.x).abs() < 1e-12);
            assert!((end.y - mid.y).abs() < 1e-12);
        }
    }

    #[test]
    fn test_optimize_reduces_segment_count_on_smooth_ring() {
        let curve = smooth(&polygon_vertices(24, 50.0), 1.0);
        let optimized = optimize_curve(&curve, 0.2);
        assert!(optimized.len() < curve.len());
        assert!(!optimized.is_empty());
    }

    #[test]
    fn test_optimize_keeps_corners() {
        let curve = smooth(&square_vertices(), 1.0);
        let optimized = optimize_curve(&curve, 0.2);
        // Nothing to merge across corners: the curve survives unchanged.
        assert_eq!(optimized.len(), curve.len());
        assert!(optimized.tag.iter().all(|&t| t == SegmentTag::Corner));
    }

    #[test]
    fn test_optimize_betas_in_unit_range() {
        let curve = smooth(&polygon_vertices(24, 50.0), 1.0);
        let optimized = optimize_curve(&curve, 0.2);
        for &beta in &optimized.beta {
            assert!((0.0..=1.0).contains(&beta), "beta out of range: {beta}");
        }
    }
}
