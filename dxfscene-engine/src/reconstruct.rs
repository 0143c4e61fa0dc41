use dxfscene_core::{
    drawing::LayerTable,
    geometry::{Point2, Point3, Vector3},
    record::{PolylineRecord, RawEntityRecord, RawGeometry},
    render::{DrawingBounds, RenderEntity, RenderKind},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::palette::resolve_color;
use crate::tessellate;

const MIN_CIRCLE_SEGMENTS: usize = 3;
const MIN_ARC_SEGMENTS: usize = 1;

/// 曲线离散化精度。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tessellation {
    pub circle_segments: usize,
    pub arc_segments: usize,
}

impl Default for Tessellation {
    fn default() -> Self {
        Self {
            circle_segments: 32,
            arc_segments: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconstructOptions {
    pub tessellation: Tessellation,
    /// 自动缩放的目标尺寸（场景单位）。
    pub target_envelope_size: f64,
    /// 绘图平面抬升的高度，避免与地面网格 z-fighting。
    pub plane_offset: f64,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self {
            tessellation: Tessellation::default(),
            target_envelope_size: 20.0,
            plane_offset: 0.01,
        }
    }
}

impl ReconstructOptions {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.tessellation.circle_segments < MIN_CIRCLE_SEGMENTS {
            return Err(EngineError::InvalidSegments {
                name: "circle_segments",
                value: self.tessellation.circle_segments,
                min: MIN_CIRCLE_SEGMENTS,
            });
        }
        if self.tessellation.arc_segments < MIN_ARC_SEGMENTS {
            return Err(EngineError::InvalidSegments {
                name: "arc_segments",
                value: self.tessellation.arc_segments,
                min: MIN_ARC_SEGMENTS,
            });
        }
        if !self.target_envelope_size.is_finite() || self.target_envelope_size <= 0.0 {
            return Err(EngineError::InvalidEnvelope(self.target_envelope_size));
        }
        if !self.plane_offset.is_finite() {
            return Err(EngineError::InvalidPlaneOffset(self.plane_offset));
        }
        Ok(())
    }

    /// 把非法取值修正到最近的合法值（或默认值）。
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        let envelope = if self.target_envelope_size.is_finite() && self.target_envelope_size > 0.0
        {
            self.target_envelope_size
        } else {
            defaults.target_envelope_size
        };
        let plane_offset = if self.plane_offset.is_finite() {
            self.plane_offset
        } else {
            defaults.plane_offset
        };
        Self {
            tessellation: Tessellation {
                circle_segments: self.tessellation.circle_segments.max(MIN_CIRCLE_SEGMENTS),
                arc_segments: self.tessellation.arc_segments.max(MIN_ARC_SEGMENTS),
            },
            target_envelope_size: envelope,
            plane_offset,
        }
    }
}

/// 绘图平面到场景的坐标映射：X 不变，DXF 的 Y 映射到场景 -Z，竖直方向为固定高度。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMapping {
    pub plane_offset: f64,
}

impl SceneMapping {
    #[inline]
    pub fn to_scene(&self, point: Point2) -> Point3 {
        Point3::new(point.x(), self.plane_offset, -point.y())
    }

    /// 标高不参与映射，所有图元都铺在同一平面上。
    #[inline]
    pub fn to_scene_3d(&self, point: Point3) -> Point3 {
        self.to_scene(point.xy())
    }

    pub fn map_all<I>(&self, points: I) -> Vec<Point3>
    where
        I: IntoIterator<Item = Point2>,
    {
        points.into_iter().map(|point| self.to_scene(point)).collect()
    }
}

/// 归一化变换：`p' = ((p.x − offset.x)·scale, p.y, (p.z − offset.z)·scale)`。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationTransform {
    pub scale: f64,
    pub offset: Vector3,
}

impl NormalizationTransform {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            offset: Vector3::ZERO,
        }
    }

    #[inline]
    pub fn apply_point(&self, point: Point3) -> Point3 {
        Point3::new(
            (point.x() - self.offset.x()) * self.scale,
            point.y(),
            (point.z() - self.offset.z()) * self.scale,
        )
    }

    #[inline]
    pub fn apply_length(&self, length: f64) -> f64 {
        length * self.scale
    }

    /// 场景坐标还原为归一化前的场景坐标。
    #[inline]
    pub fn invert_point(&self, point: Point3) -> Point3 {
        Point3::new(
            point.x() / self.scale + self.offset.x(),
            point.y(),
            point.z() / self.scale + self.offset.z(),
        )
    }
}

impl Default for NormalizationTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// 一次重建的结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedDrawing {
    pub entities: Vec<RenderEntity>,
    pub bounds: DrawingBounds,
    pub transform: NormalizationTransform,
}

impl ReconstructedDrawing {
    pub fn empty() -> Self {
        Self {
            entities: Vec::new(),
            bounds: DrawingBounds::zero(),
            transform: NormalizationTransform::identity(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn count_of(&self, kind: RenderKind) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.kind == kind)
            .count()
    }
}

/// 根据水平尺寸决定缩放比例。过大则缩小到目标尺寸，过小则放大；尺寸为 0 时不缩放。
pub fn envelope_scale(max_size: f64, target: f64) -> f64 {
    if !max_size.is_finite() || max_size <= f64::EPSILON {
        return 1.0;
    }
    if max_size > 2.0 * target || max_size < 1.0 {
        target / max_size
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    options: ReconstructOptions,
    layers: LayerTable,
}

impl Reconstructor {
    pub fn new(options: ReconstructOptions) -> Result<Self, EngineError> {
        options.validate()?;
        Ok(Self {
            options,
            layers: LayerTable::new(),
        })
    }

    /// 不校验，直接使用修正后的选项。
    pub fn lenient(options: &ReconstructOptions) -> Self {
        let clamped = options.clamped();
        if clamped != *options {
            warn!(?options, ?clamped, "重建选项非法，已修正");
        }
        Self {
            options: clamped,
            layers: LayerTable::new(),
        }
    }

    /// 提供图层表，用于颜色的第二级回退。
    pub fn with_layers(mut self, layers: &LayerTable) -> Self {
        self.layers = layers.clone();
        self
    }

    pub fn reconstruct(&self, records: &[RawEntityRecord]) -> ReconstructedDrawing {
        let entities: Vec<RenderEntity> = records
            .iter()
            .filter_map(|record| {
                let entity = self.build_entity(record);
                if entity.is_none() {
                    debug!(kind = ?record.kind(), layer = %record.layer, "记录无法重建，已跳过");
                }
                entity
            })
            .collect();

        let drawing = self.normalize(entities);
        debug!(
            entities = drawing.entities.len(),
            records = records.len(),
            scale = drawing.transform.scale,
            "几何重建完成"
        );
        drawing
    }

    fn mapping(&self) -> SceneMapping {
        SceneMapping {
            plane_offset: self.options.plane_offset,
        }
    }

    fn build_entity(&self, record: &RawEntityRecord) -> Option<RenderEntity> {
        let mapping = self.mapping();
        let tessellation = self.options.tessellation;
        let color = resolve_color(&record.color, &record.layer, &self.layers);
        let entity = |kind: RenderKind, points: Vec<Point3>| {
            RenderEntity::new(kind, points, color, record.layer.clone(), record.kind())
        };

        let rendered = match &record.geometry {
            RawGeometry::Line {
                vertices,
                start,
                end,
            } => {
                let (from, to) = match vertices.as_slice() {
                    [first, second, ..] => (*first, *second),
                    _ => (
                        start.unwrap_or(Point3::ORIGIN),
                        end.unwrap_or(Point3::ORIGIN),
                    ),
                };
                entity(
                    RenderKind::Line,
                    vec![mapping.to_scene_3d(from), mapping.to_scene_3d(to)],
                )
            }
            RawGeometry::LwPolyline(polyline) | RawGeometry::Polyline(polyline) => {
                entity(RenderKind::Polyline, self.polyline(polyline)?)
            }
            RawGeometry::Hatch { boundary } => {
                let boundary = boundary.as_ref()?;
                let closed = PolylineRecord::new(boundary.vertices.clone(), true);
                entity(RenderKind::Polyline, self.polyline(&closed)?)
            }
            RawGeometry::Circle { center, radius } => {
                let points =
                    tessellate::circle_points(center.xy(), *radius, tessellation.circle_segments);
                let mut circle = entity(RenderKind::Circle, mapping.map_all(points));
                circle.center = Some(mapping.to_scene_3d(*center));
                circle.radius = Some(*radius);
                circle
            }
            RawGeometry::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => {
                let points = tessellate::arc_points(
                    center.xy(),
                    *radius,
                    *start_angle,
                    *end_angle,
                    tessellation.arc_segments,
                );
                let mut arc = entity(RenderKind::Arc, mapping.map_all(points));
                arc.center = Some(mapping.to_scene_3d(*center));
                arc.radius = Some(*radius);
                arc
            }
            RawGeometry::Ellipse {
                center,
                major_axis_endpoint,
                axis_ratio,
                start_parameter,
                end_parameter,
            } => {
                let points = tessellate::ellipse_points(
                    center.xy(),
                    *major_axis_endpoint,
                    *axis_ratio,
                    *start_parameter,
                    *end_parameter,
                    tessellation.circle_segments,
                );
                entity(RenderKind::Polyline, mapping.map_all(points))
            }
            RawGeometry::Text {
                position,
                text,
                height,
                rotation,
            }
            | RawGeometry::MText {
                position,
                text,
                height,
                rotation,
            } => {
                let mut label = entity(RenderKind::Text, vec![mapping.to_scene_3d(*position)]);
                label.text = Some(text.clone());
                label.text_height = Some(*height);
                label.rotation = Some(*rotation);
                label
            }
            RawGeometry::Spline {
                control_points,
                fit_points,
                closed,
                ..
            } => {
                let control: Vec<Point2> = control_points.iter().map(|p| p.xy()).collect();
                let fit: Vec<Point2> = fit_points.iter().map(|p| p.xy()).collect();
                let points = tessellate::spline_points(&control, &fit, *closed);
                if points.is_empty() {
                    return None;
                }
                entity(RenderKind::Polyline, mapping.map_all(points))
            }
            RawGeometry::Solid { corners } => {
                let ordered: Vec<Point3> = match corners.as_slice() {
                    [a, b, c, d] if d != c => vec![*a, *b, *d, *c, *a],
                    [a, b, c, ..] => vec![*a, *b, *c, *a],
                    _ => return None,
                };
                entity(
                    RenderKind::Polyline,
                    ordered.into_iter().map(|p| mapping.to_scene_3d(p)).collect(),
                )
            }
            RawGeometry::Insert {
                position,
                block_name,
            } => {
                let mut marker = entity(RenderKind::Point, vec![mapping.to_scene_3d(*position)]);
                marker.text = block_name.clone();
                marker
            }
            RawGeometry::Dimension {
                definition_point,
                text,
                ..
            } => {
                let mut marker =
                    entity(RenderKind::Point, vec![mapping.to_scene_3d(*definition_point)]);
                marker.text = text.clone();
                marker
            }
            RawGeometry::Point { position } => {
                entity(RenderKind::Point, vec![mapping.to_scene_3d(*position)])
            }
        };
        Some(rendered)
    }

    fn polyline(&self, polyline: &PolylineRecord) -> Option<Vec<Point3>> {
        let points = tessellate::polyline_points(&polyline.vertices, polyline.closed);
        if points.is_empty() {
            return None;
        }
        Some(self.mapping().map_all(points))
    }

    fn normalize(&self, mut entities: Vec<RenderEntity>) -> ReconstructedDrawing {
        if entities.is_empty() {
            return ReconstructedDrawing::empty();
        }

        let raw_bounds = DrawingBounds::of_entities(&entities);
        let max_size = raw_bounds.max_horizontal_size();
        let scale = envelope_scale(max_size, self.options.target_envelope_size);
        let transform = NormalizationTransform {
            scale,
            offset: Vector3::new(raw_bounds.center.x(), 0.0, raw_bounds.center.z()),
        };
        debug!(max_size, scale, "应用缩放与居中");

        for entity in &mut entities {
            for point in &mut entity.points {
                *point = transform.apply_point(*point);
            }
            entity.center = entity.center.map(|center| transform.apply_point(center));
            entity.radius = entity.radius.map(|radius| transform.apply_length(radius));
            entity.text_height = entity
                .text_height
                .map(|height| transform.apply_length(height));
        }

        let bounds = DrawingBounds::of_entities(&entities);
        ReconstructedDrawing {
            entities,
            bounds,
            transform,
        }
    }
}

/// 重建入口。非法选项会被修正而不是报错，保证总能得到结果。
pub fn reconstruct(
    records: &[RawEntityRecord],
    options: &ReconstructOptions,
) -> ReconstructedDrawing {
    Reconstructor::lenient(options).reconstruct(records)
}
