//! 曲线离散化。所有函数都在 DXF 绘图平面（二维）上工作，坐标映射由调用方完成。

use std::f64::consts::{PI, TAU};

use dxfscene_core::{
    geometry::{Point2, Vector2},
    record::PolylineVertex,
};
use glam::DVec2;

/// |bulge| 小于该值时视为直线段。
pub const BULGE_EPSILON: f64 = 1e-9;
const ARC_STEP: f64 = PI / 8.0;
const MIN_BULGE_SEGMENTS: usize = 4;
const FULL_TURN_EPSILON: f64 = 1e-9;

#[inline]
fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
    Point2::new(
        center.x() + radius * angle.cos(),
        center.y() + radius * angle.sin(),
    )
}

/// 整圆：返回 `segments + 1` 个点，最后一个点与第一个点完全相同。
pub fn circle_points(center: Point2, radius: f64, segments: usize) -> Vec<Point2> {
    let segments = segments.max(1);
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..segments {
        let angle = TAU * (i as f64) / (segments as f64);
        points.push(point_on_circle(center, radius, angle));
    }
    points.push(points[0]);
    points
}

/// 圆弧沿角度递增方向从起始角扫到终止角。两个角度先归一化到 [0, 2π)，
/// 之后终止角不大于起始角时加一整圈。
pub fn arc_points(
    center: Point2,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    segments: usize,
) -> Vec<Point2> {
    let segments = segments.max(1);
    let start = start_angle.rem_euclid(TAU);
    let mut span = end_angle.rem_euclid(TAU) - start;
    if span <= FULL_TURN_EPSILON {
        span += TAU;
    }
    (0..=segments)
        .map(|i| {
            let angle = start + span * (i as f64 / segments as f64);
            point_on_circle(center, radius, angle)
        })
        .collect()
}

/// 椭圆按参数角采样：`center + major·cos(t) + minor·sin(t)`。
/// 参数范围覆盖整圈时首尾闭合。
pub fn ellipse_points(
    center: Point2,
    major_axis: Vector2,
    axis_ratio: f64,
    start_parameter: f64,
    end_parameter: f64,
    segments: usize,
) -> Vec<Point2> {
    let segments = segments.max(1);
    let major_vec = major_axis.as_vec2();
    let major_length = major_vec.length();
    if major_length <= f64::EPSILON {
        return vec![center, center];
    }
    let rotation = major_axis.angle();
    let minor_vec = DVec2::from_angle(rotation).perp() * (major_length * axis_ratio.abs());

    let mut end = end_parameter;
    if end <= start_parameter {
        end += TAU;
    }
    let span = end - start_parameter;
    let full_ring = (span - TAU).abs() <= 1e-9;

    let mut points: Vec<Point2> = (0..=segments)
        .map(|i| {
            let t = start_parameter + span * (i as f64 / segments as f64);
            Point2::from_vec(center.as_vec2() + major_vec * t.cos() + minor_vec * t.sin())
        })
        .collect();
    if full_ring {
        points[segments] = points[0];
    }
    points
}

/// 由 bulge 还原出的圆弧。`sweep` 为带符号的包含角，正值为逆时针。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulgeArc {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl BulgeArc {
    /// 弦长为 0 或 bulge 近似为 0 时返回 `None`，调用方按直线处理。
    pub fn from_segment(start: Point2, end: Point2, bulge: f64) -> Option<Self> {
        if !bulge.is_finite() || bulge.abs() < BULGE_EPSILON {
            return None;
        }
        let chord = end.as_vec2() - start.as_vec2();
        let chord_length = chord.length();
        if chord_length <= f64::EPSILON {
            return None;
        }

        let sweep = 4.0 * bulge.atan();
        let radius = chord_length / (2.0 * (sweep.abs() / 2.0).sin());
        // 圆心位于弦中垂线上，距中点 chord·(1 − b²)/(4b)，正值在弦的左侧
        let offset = chord_length * (1.0 - bulge * bulge) / (4.0 * bulge);
        let midpoint = (start.as_vec2() + end.as_vec2()) * 0.5;
        let left = chord.perp() / chord_length;
        let center = midpoint + left * offset;
        let start_dir = start.as_vec2() - center;

        Some(Self {
            center: Point2::from_vec(center),
            radius,
            start_angle: start_dir.y.atan2(start_dir.x),
            sweep,
        })
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        let steps = (self.sweep.abs() / ARC_STEP - 1e-9).ceil();
        (steps as usize).max(MIN_BULGE_SEGMENTS)
    }

    #[inline]
    pub fn point_at(&self, fraction: f64) -> Point2 {
        point_on_circle(self.center, self.radius, self.start_angle + self.sweep * fraction)
    }
}

/// 单个多段线段的采样点，包含两端。
pub fn bulge_segment_points(start: Point2, end: Point2, bulge: f64) -> Vec<Point2> {
    let Some(arc) = BulgeArc::from_segment(start, end, bulge) else {
        return vec![start, end];
    };
    let segments = arc.segment_count();
    let mut points = Vec::with_capacity(segments + 1);
    points.push(start);
    for i in 1..segments {
        points.push(arc.point_at(i as f64 / segments as f64));
    }
    points.push(end);
    points
}

/// 展开多段线顶点。闭合时补上回到首顶点的线段，终点与首点完全一致。
pub fn polyline_points(vertices: &[PolylineVertex], closed: bool) -> Vec<Point2> {
    match vertices {
        [] => Vec::new(),
        [only] => vec![only.position, only.position],
        _ => {
            let segment_count = if closed {
                vertices.len()
            } else {
                vertices.len() - 1
            };
            let mut points = vec![vertices[0].position];
            for index in 0..segment_count {
                let current = &vertices[index];
                let next = &vertices[(index + 1) % vertices.len()];
                let segment = bulge_segment_points(current.position, next.position, current.bulge);
                points.extend(segment.into_iter().skip(1));
            }
            points
        }
    }
}

/// 样条按控制点（缺失时用拟合点）做分段线性近似。
pub fn spline_points(
    control_points: &[Point2],
    fit_points: &[Point2],
    closed: bool,
) -> Vec<Point2> {
    let source = if control_points.is_empty() {
        fit_points
    } else {
        control_points
    };
    let mut points = source.to_vec();
    match points.as_slice() {
        [] => {}
        [only] => points.push(*only),
        [first, .., last] => {
            if closed && !points_close(*first, *last) {
                points.push(*first);
            }
        }
    }
    points
}

#[inline]
pub fn points_close(a: Point2, b: Point2) -> bool {
    (a.x() - b.x()).abs() < 1e-6 && (a.y() - b.y()).abs() < 1e-6
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn assert_point(actual: Point2, x: f64, y: f64) {
        assert!(
            (actual.x() - x).abs() < 1e-9 && (actual.y() - y).abs() < 1e-9,
            "期望 ({x}, {y})，实际 ({}, {})",
            actual.x(),
            actual.y()
        );
    }

    #[test]
    fn circle_ring_is_closed() {
        let points = circle_points(Point2::new(1.0, 1.0), 2.0, 8);
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], points[8]);
        assert_point(points[2], 1.0, 3.0);
    }

    #[test]
    fn arc_wraps_when_end_precedes_start() {
        let points = arc_points(Point2::new(0.0, 0.0), 1.0, 3.0 * FRAC_PI_2, FRAC_PI_2, 4);
        assert_eq!(points.len(), 5);
        assert_point(points[0], 0.0, -1.0);
        assert_point(points[2], 1.0, 0.0);
        assert_point(points[4], 0.0, 1.0);
    }

    #[test]
    fn arc_angles_beyond_full_turn_are_normalized() {
        let points = arc_points(Point2::new(0.0, 0.0), 1.0, 0.0, 400f64.to_radians(), 4);
        assert_eq!(points.len(), 5);
        assert_point(points[0], 1.0, 0.0);
        let end = 40f64.to_radians();
        assert_point(points[4], end.cos(), end.sin());
        assert!(points.iter().all(|p| p.y() >= -1e-12 && p.x() >= end.cos() - 1e-12));

        let negative = arc_points(Point2::new(0.0, 0.0), 1.0, -FRAC_PI_2, 0.0, 2);
        assert_point(negative[0], 0.0, -1.0);
        assert_point(negative[2], 1.0, 0.0);
    }

    #[test]
    fn arc_of_full_degrees_is_a_full_ring() {
        let points = arc_points(Point2::new(0.0, 0.0), 1.0, 0.0, 360f64.to_radians(), 4);
        assert_point(points[2], -1.0, 0.0);
        assert_point(points[4], 1.0, 0.0);
    }

    #[test]
    fn semicircle_bulge_centers_on_chord() {
        let arc = BulgeArc::from_segment(Point2::new(10.0, 0.0), Point2::new(10.0, 10.0), 1.0)
            .expect("bulge 非零时应得到圆弧");
        assert_point(arc.center, 10.0, 5.0);
        assert!((arc.radius - 5.0).abs() < 1e-9);
        assert!((arc.sweep - PI).abs() < 1e-12);
        assert_eq!(arc.segment_count(), 8);
        assert_point(arc.point_at(0.5), 15.0, 5.0);
    }

    #[test]
    fn negative_bulge_turns_clockwise() {
        let arc = BulgeArc::from_segment(Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), -1.0)
            .expect("bulge 非零时应得到圆弧");
        assert!(arc.sweep < 0.0);
        assert_point(arc.point_at(0.5), 1.0, 1.0);
    }

    #[test]
    fn shallow_bulge_center_is_offset() {
        // 四分之一圆：bulge = tan(π/8)
        let bulge = (PI / 8.0).tan();
        let arc = BulgeArc::from_segment(Point2::new(1.0, 0.0), Point2::new(0.0, 1.0), bulge)
            .expect("bulge 非零时应得到圆弧");
        assert_point(arc.center, 0.0, 0.0);
        assert!((arc.radius - 1.0).abs() < 1e-9);
        assert_eq!(arc.segment_count(), 4);
    }

    #[test]
    fn straight_segments_stay_straight() {
        let points = bulge_segment_points(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0), 0.0);
        assert_eq!(points.len(), 2);
        let degenerate = bulge_segment_points(Point2::new(1.0, 1.0), Point2::new(1.0, 1.0), 1.0);
        assert_eq!(degenerate.len(), 2);
    }

    #[test]
    fn closed_polyline_returns_to_first_vertex() {
        let vertices = [
            PolylineVertex::new(Point2::new(0.0, 0.0)),
            PolylineVertex::new(Point2::new(4.0, 0.0)),
            PolylineVertex::with_bulge(Point2::new(4.0, 3.0), 0.5),
        ];
        let points = polyline_points(&vertices, true);
        assert_eq!(points.first(), points.last());
        assert!(points.len() > 4);

        let open = polyline_points(&vertices[..2], false);
        assert_eq!(open.len(), 2);

        let single = polyline_points(&vertices[..1], false);
        assert_eq!(single, vec![Point2::new(0.0, 0.0), Point2::new(0.0, 0.0)]);
    }

    #[test]
    fn ellipse_follows_rotated_axes() {
        let points = ellipse_points(
            Point2::new(0.0, 0.0),
            Vector2::new(0.0, 2.0),
            0.5,
            0.0,
            TAU,
            4,
        );
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], points[4]);
        assert_point(points[0], 0.0, 2.0);
        assert_point(points[1], -1.0, 0.0);
        assert_point(points[2], 0.0, -2.0);
    }

    #[test]
    fn spline_uses_control_points_then_fit_points() {
        let control = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 0.0)];
        assert_eq!(spline_points(&control, &[], false).len(), 3);
        let closed = spline_points(&control, &[], true);
        assert_eq!(closed.len(), 4);
        assert_eq!(closed[3], control[0]);

        let fit = [Point2::new(5.0, 5.0)];
        assert_eq!(spline_points(&[], &fit, false), vec![fit[0], fit[0]]);
        assert!(spline_points(&[], &[], false).is_empty());
    }
}
