use std::f64::consts::{PI, TAU};
use std::fs;
use std::path::{Path, PathBuf};

use dxfscene_core::{
    color::Rgb,
    drawing::{DrawingHeader, DrawingUnits, LayerInfo, LayerTable},
    geometry::{Point2, Point3, Vector2},
    record::{
        EntityColor, EntityKind, PolylineRecord, PolylineVertex, RawEntityRecord, RawGeometry,
    },
};
use thiserror::Error;
use tracing::{debug, info, warn};

const BINARY_DXF_SENTINEL: &[u8] = b"AutoCAD Binary DXF";
const BULGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file {path:?} is {size} bytes, over the import limit of {limit} bytes")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("binary DXF is not supported: {0:?}")]
    BinaryDxf(PathBuf),
}

/// 解析过程中记录的问题。它们不会中断导入，只是交给调用方决定是否展示。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseIssue {
    #[error("第 {line} 行的 {entity} 实体被丢弃：{reason}")]
    DroppedEntity {
        entity: String,
        line: usize,
        reason: String,
    },
    #[error("第 {line} 行附近的数据无法解析，已停止读取：{message}")]
    BrokenStream { line: usize, message: String },
    #[error("文档中未找到 ENTITIES 段")]
    MissingEntities,
}

/// 一次解析的完整产物：头变量、图层表、实体记录以及诊断信息。
#[derive(Debug, Clone, Default)]
pub struct ParsedDrawing {
    pub header: DrawingHeader,
    pub layers: LayerTable,
    pub records: Vec<RawEntityRecord>,
    pub issues: Vec<ParseIssue>,
}

impl ParsedDrawing {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub trait DrawingLoader {
    fn load(&self, path: &Path) -> Result<ParsedDrawing, IoError>;
}

/// 文件入口。可选的大小上限用于在读取前拒绝过大的文件。
#[derive(Debug, Clone, Default)]
pub struct DxfFacade {
    max_bytes: Option<u64>,
}

impl DxfFacade {
    pub fn new() -> Self {
        Self { max_bytes: None }
    }

    pub fn with_max_bytes(mut self, limit: u64) -> Self {
        self.max_bytes = Some(limit);
        self
    }
}

impl DrawingLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<ParsedDrawing, IoError> {
        let read_error = |source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        };
        if let Some(limit) = self.max_bytes {
            let size = fs::metadata(path).map_err(read_error)?.len();
            if size > limit {
                return Err(IoError::TooLarge {
                    path: path.to_path_buf(),
                    size,
                    limit,
                });
            }
        }

        let bytes = fs::read(path).map_err(read_error)?;
        if bytes.starts_with(BINARY_DXF_SENTINEL) {
            return Err(IoError::BinaryDxf(path.to_path_buf()));
        }
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), "文件不是合法的 UTF-8，按有损方式解码");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };

        let drawing = parse_drawing(&text);
        info!(
            path = %path.display(),
            records = drawing.records.len(),
            layers = drawing.layers.len(),
            issues = drawing.issues.len(),
            "DXF 解析完成"
        );
        Ok(drawing)
    }
}

/// 只返回实体记录，按文档顺序排列。无法识别的输入得到空序列。
pub fn parse_stream(source: &str) -> Vec<RawEntityRecord> {
    parse_drawing(source).records
}

/// 解析整个 DXF 文本。该函数不会失败：损坏的数据只会体现在 `issues` 中。
pub fn parse_drawing(source: &str) -> ParsedDrawing {
    DxfParser::new(source).parse()
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    drawing: ParsedDrawing,
    saw_entities: bool,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            drawing: ParsedDrawing::default(),
            saw_entities: false,
        }
    }

    fn parse(mut self) -> ParsedDrawing {
        if let Err(issue) = self.walk_sections() {
            warn!(%issue, "DXF 数据流中断，保留已解析的实体");
            self.drawing.issues.push(issue);
        }
        if !self.saw_entities {
            self.drawing.issues.push(ParseIssue::MissingEntities);
        }
        debug!(
            records = self.drawing.records.len(),
            issues = self.drawing.issues.len(),
            "DXF 数据流遍历结束"
        );
        self.drawing
    }

    fn walk_sections(&mut self) -> Result<(), ParseIssue> {
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                // 段外的孤立组码直接跳过
                continue;
            }
            match value.trim() {
                "SECTION" => match self.section_name()?.as_deref() {
                    Some("ENTITIES") => {
                        self.saw_entities = true;
                        self.parse_entities()?;
                    }
                    Some("HEADER") => self.parse_header()?,
                    Some("TABLES") => self.parse_tables()?,
                    _ => self.skip_section()?,
                },
                "EOF" => break,
                _ => {}
            }
        }
        Ok(())
    }

    fn section_name(&mut self) -> Result<Option<String>, ParseIssue> {
        match self.reader.next_pair()? {
            Some((2, name)) => Ok(Some(name.trim().to_string())),
            Some(pair) => {
                self.reader.put_back(pair);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn skip_section(&mut self) -> Result<(), ParseIssue> {
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 0 && value.trim() == "ENDSEC" {
                break;
            }
        }
        Ok(())
    }

    fn parse_header(&mut self) -> Result<(), ParseIssue> {
        let mut variable: Option<String> = None;
        while let Some((code, value)) = self.reader.next_pair()? {
            match code {
                0 if value.trim() == "ENDSEC" => break,
                9 => variable = Some(value.trim().to_string()),
                _ => match (variable.as_deref(), code) {
                    (Some("$ACADVER"), 1) => {
                        self.drawing.header.version = Some(value.trim().to_string());
                    }
                    (Some("$INSUNITS"), 70) => {
                        if let Some(units) = parse_i16(&value) {
                            self.drawing.header.units = DrawingUnits::from_code(units);
                        }
                    }
                    _ => {}
                },
            }
        }
        Ok(())
    }

    fn parse_tables(&mut self) -> Result<(), ParseIssue> {
        let mut table_name: Option<String> = None;
        let mut awaiting_table_name = false;
        let mut current: Option<LayerInfo> = None;

        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 0 {
                if let Some(layer) = current.take() {
                    self.store_layer(layer);
                }
                awaiting_table_name = false;
                match value.trim() {
                    "ENDSEC" => break,
                    "TABLE" => awaiting_table_name = true,
                    "ENDTAB" => table_name = None,
                    "LAYER" if table_name.as_deref() == Some("LAYER") => {
                        current = Some(LayerInfo::new(""));
                    }
                    _ => {}
                }
                continue;
            }

            if awaiting_table_name && code == 2 {
                table_name = Some(value.trim().to_string());
                awaiting_table_name = false;
                continue;
            }

            let Some(layer) = current.as_mut() else {
                continue;
            };
            match code {
                2 => layer.name = value.trim().to_string(),
                62 => {
                    if let Some(index) = parse_i16(&value) {
                        // 负的颜色号表示图层关闭
                        layer.is_visible = index >= 0;
                        layer.color.index = Some(index.saturating_abs());
                    }
                }
                420 => layer.color.true_color = parse_true_color(&value),
                70 => layer.is_frozen = parse_i32(&value).unwrap_or(0) & 0x01 != 0,
                _ => {}
            }
        }

        if let Some(layer) = current.take() {
            self.store_layer(layer);
        }
        Ok(())
    }

    fn store_layer(&mut self, layer: LayerInfo) {
        if layer.name.is_empty() {
            debug!("忽略缺少名称的图层记录");
            return;
        }
        self.drawing.layers.insert(layer);
    }

    fn parse_entities(&mut self) -> Result<(), ParseIssue> {
        let mut current: Option<RecordBuilder> = None;
        let outcome = self.walk_entities(&mut current);
        if let Some(builder) = current.take() {
            self.finish_record(builder);
        }
        outcome
    }

    fn walk_entities(&mut self, current: &mut Option<RecordBuilder>) -> Result<(), ParseIssue> {
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                if let Some(builder) = current.as_mut() {
                    builder.apply(code, &value);
                }
                continue;
            }

            let name = value.trim();
            let line = self.reader.line_number().saturating_sub(1);
            match name {
                "ENDSEC" => break,
                "VERTEX" if current
                    .as_ref()
                    .is_some_and(|builder| builder.kind == EntityKind::Polyline) =>
                {
                    if let Some(builder) = current.as_mut() {
                        builder.begin_vertex();
                    }
                }
                "SEQEND" => {
                    if let Some(builder) = current.take() {
                        self.finish_record(builder);
                    }
                }
                _ => {
                    if let Some(builder) = current.take() {
                        self.finish_record(builder);
                    }
                    *current = Some(RecordBuilder::new(name, line));
                }
            }
        }
        Ok(())
    }

    fn finish_record(&mut self, builder: RecordBuilder) {
        let entity = builder.type_name.clone();
        let line = builder.line;
        match builder.build() {
            Ok(Some(record)) => self.drawing.records.push(record),
            Ok(None) => debug!(entity = %entity, line, "实体未包含几何数据，忽略"),
            Err(reason) => {
                debug!(entity = %entity, line, %reason, "丢弃无法重建的实体");
                self.drawing.issues.push(ParseIssue::DroppedEntity {
                    entity,
                    line,
                    reason,
                });
            }
        }
    }
}

/// 按 X→Y(→Z) 顺序组装坐标。Y 到达时即生成点，紧随其后的 Z 补充标高。
#[derive(Debug, Default)]
struct PointSeq {
    points: Vec<Point3>,
    pending_x: Option<f64>,
    open_z: bool,
}

impl PointSeq {
    fn x(&mut self, value: Option<f64>) {
        self.pending_x = value;
        self.open_z = false;
    }

    fn y(&mut self, value: Option<f64>) -> bool {
        self.open_z = false;
        match (self.pending_x.take(), value) {
            (Some(x), Some(y)) => {
                self.points.push(Point3::new(x, y, 0.0));
                self.open_z = true;
                true
            }
            _ => false,
        }
    }

    fn z(&mut self, value: Option<f64>) {
        if !std::mem::take(&mut self.open_z) {
            return;
        }
        if let (Some(z), Some(last)) = (value, self.points.last_mut()) {
            *last = last.with_z(z);
        }
    }

    #[inline]
    fn first(&self) -> Option<Point3> {
        self.points.first().copied()
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 单个实体的字段累加器。组码含义依实体类型而定，在 `build` 时转换为强类型记录。
struct RecordBuilder {
    kind: EntityKind,
    type_name: String,
    line: usize,
    layer: Option<String>,
    color: EntityColor,
    flags: i32,
    primary: PointSeq,
    secondary: PointSeq,
    third: PointSeq,
    fourth: PointSeq,
    bulges: Vec<f64>,
    radius: Option<f64>,
    height: Option<f64>,
    axis_ratio: Option<f64>,
    start_angle: Option<f64>,
    end_angle: Option<f64>,
    start_parameter: Option<f64>,
    end_parameter: Option<f64>,
    rotation: Option<f64>,
    fragments: Vec<String>,
    block_name: Option<String>,
    /// 当前 10/20 组是否生成了顶点；为假时其后的 42 不归属任何顶点。
    vertex_open: bool,
    in_vertex: bool,
    hatch: HatchBoundaryBuilder,
}

impl RecordBuilder {
    fn new(type_name: &str, line: usize) -> Self {
        Self {
            kind: EntityKind::from_name(type_name),
            type_name: type_name.to_string(),
            line,
            layer: None,
            color: EntityColor::by_layer(),
            flags: 0,
            primary: PointSeq::default(),
            secondary: PointSeq::default(),
            third: PointSeq::default(),
            fourth: PointSeq::default(),
            bulges: Vec::new(),
            radius: None,
            height: None,
            axis_ratio: None,
            start_angle: None,
            end_angle: None,
            start_parameter: None,
            end_parameter: None,
            rotation: None,
            fragments: Vec::new(),
            block_name: None,
            vertex_open: false,
            in_vertex: false,
            hatch: HatchBoundaryBuilder::default(),
        }
    }

    fn begin_vertex(&mut self) {
        self.in_vertex = true;
        self.vertex_open = false;
    }

    fn apply(&mut self, code: i32, value: &str) {
        if self.apply_common(code, value) {
            return;
        }
        match self.kind {
            EntityKind::Unknown => {}
            EntityKind::Line => {
                if matches!(code, 10 | 20 | 30 | 11 | 21 | 31) {
                    self.feed_point(code, value);
                }
            }
            EntityKind::Point | EntityKind::Insert => match code {
                10 | 20 | 30 => {
                    self.feed_point(code, value);
                }
                2 => self.block_name = Some(value.trim().to_string()),
                _ => {}
            },
            EntityKind::LwPolyline => match code {
                10 | 20 => self.feed_vertex(code, value),
                42 => self.set_last_bulge(value),
                70 => self.flags = parse_i32(value).unwrap_or(0),
                _ => {}
            },
            EntityKind::Polyline => {
                if self.in_vertex {
                    match code {
                        10 | 20 | 30 => self.feed_vertex(code, value),
                        42 => self.set_last_bulge(value),
                        _ => {}
                    }
                } else if code == 70 {
                    // 头部的 10/20/30 只是占位点，不参与几何
                    self.flags = parse_i32(value).unwrap_or(0);
                }
            }
            EntityKind::Circle | EntityKind::Arc => match code {
                10 | 20 | 30 => {
                    self.feed_point(code, value);
                }
                40 => self.radius = parse_f64(value),
                50 => self.start_angle = parse_f64(value).map(f64::to_radians),
                51 => self.end_angle = parse_f64(value).map(f64::to_radians),
                _ => {}
            },
            EntityKind::Text | EntityKind::MText => match code {
                10 | 20 | 30 | 11 | 21 | 31 => {
                    self.feed_point(code, value);
                }
                40 => self.height = parse_f64(value),
                50 => self.rotation = parse_f64(value).map(f64::to_radians),
                1 | 3 => self.fragments.push(value.to_string()),
                _ => {}
            },
            EntityKind::Ellipse => match code {
                10 | 20 | 30 | 11 | 21 | 31 => {
                    self.feed_point(code, value);
                }
                40 => self.axis_ratio = parse_f64(value),
                41 => self.start_parameter = parse_f64(value),
                42 => self.end_parameter = parse_f64(value),
                _ => {}
            },
            EntityKind::Spline => match code {
                10 | 20 | 30 | 11 | 21 | 31 => {
                    self.feed_point(code, value);
                }
                70 => self.flags = parse_i32(value).unwrap_or(0),
                _ => {}
            },
            EntityKind::Solid => {
                if matches!(code, 10..=13 | 20..=23 | 30..=33) {
                    self.feed_point(code, value);
                }
            }
            EntityKind::Hatch => self.hatch.apply(code, value),
            EntityKind::Dimension => match code {
                10 | 20 | 30 | 11 | 21 | 31 => {
                    self.feed_point(code, value);
                }
                1 => self.fragments.push(value.to_string()),
                _ => {}
            },
        }
    }

    fn apply_common(&mut self, code: i32, value: &str) -> bool {
        if self.in_vertex {
            return false;
        }
        match code {
            8 => self.layer = Some(value.trim().to_string()),
            62 => self.color.index = parse_i16(value),
            420 => self.color.true_color = parse_true_color(value),
            _ => return false,
        }
        true
    }

    /// 返回 `true` 表示本次输入补全了一个点。
    fn feed_point(&mut self, code: i32, value: &str) -> bool {
        let seq = match code % 10 {
            0 => &mut self.primary,
            1 => &mut self.secondary,
            2 => &mut self.third,
            3 => &mut self.fourth,
            _ => return false,
        };
        let value = parse_f64(value);
        match code / 10 {
            1 => {
                seq.x(value);
                false
            }
            2 => seq.y(value),
            3 => {
                seq.z(value);
                false
            }
            _ => false,
        }
    }

    fn feed_vertex(&mut self, code: i32, value: &str) {
        if code == 10 {
            self.vertex_open = false;
        }
        if self.feed_point(code, value) {
            self.bulges.push(0.0);
            self.vertex_open = true;
        }
    }

    fn set_last_bulge(&mut self, value: &str) {
        if !self.vertex_open {
            debug!(entity = %self.type_name, line = self.line, "bulge 没有对应的顶点，已忽略");
            return;
        }
        if let Some(last) = self.bulges.last_mut() {
            *last = parse_f64(value).unwrap_or(0.0);
        }
    }

    fn has_geometry(&self) -> bool {
        !(self.primary.is_empty()
            && self.secondary.is_empty()
            && self.third.is_empty()
            && self.fourth.is_empty())
    }

    fn polyline_record(&self) -> PolylineRecord {
        let vertices = self
            .primary
            .points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let bulge = self.bulges.get(index).copied().unwrap_or(0.0);
                PolylineVertex::with_bulge(point.xy(), bulge)
            })
            .collect();
        PolylineRecord::new(vertices, self.flags & 0x01 != 0)
    }

    fn build(mut self) -> Result<Option<RawEntityRecord>, String> {
        if self.kind == EntityKind::Unknown {
            return Ok(None);
        }
        let geometry = if self.kind == EntityKind::Hatch {
            match std::mem::take(&mut self.hatch).finish() {
                Some(boundary) => RawGeometry::Hatch {
                    boundary: Some(boundary),
                },
                None => return Ok(None),
            }
        } else if !self.has_geometry() {
            return Ok(None);
        } else {
            self.build_geometry()?
        };

        Ok(Some(RawEntityRecord {
            layer: self
                .layer
                .take()
                .filter(|layer| !layer.is_empty())
                .unwrap_or_else(|| RawEntityRecord::DEFAULT_LAYER.to_string()),
            color: self.color,
            geometry,
        }))
    }

    fn build_geometry(&mut self) -> Result<RawGeometry, String> {
        let name = self.kind.dxf_name();
        let anchor = |seq: &PointSeq| {
            seq.first()
                .ok_or_else(|| format!("{name} 缺少定位点（组码 10/20）"))
        };

        let geometry = match self.kind {
            EntityKind::Line => RawGeometry::Line {
                start: self.primary.first(),
                end: self.secondary.first(),
                vertices: if self.primary.points.len() >= 2 {
                    std::mem::take(&mut self.primary.points)
                } else {
                    Vec::new()
                },
            },
            EntityKind::LwPolyline => RawGeometry::LwPolyline(self.polyline_record()),
            EntityKind::Polyline => {
                if self.flags & (0x10 | 0x40) != 0 {
                    return Err("多边形网格与多面网格不在支持范围内".to_string());
                }
                RawGeometry::Polyline(self.polyline_record())
            }
            EntityKind::Circle => RawGeometry::Circle {
                center: anchor(&self.primary)?,
                radius: self.valid_radius()?,
            },
            EntityKind::Arc => RawGeometry::Arc {
                center: anchor(&self.primary)?,
                radius: self.valid_radius()?,
                start_angle: self.start_angle.unwrap_or(0.0),
                end_angle: self.end_angle.unwrap_or(0.0),
            },
            EntityKind::Text => RawGeometry::Text {
                position: anchor(&self.primary)?,
                text: decode_special_codes(&self.fragments.join("\n")),
                height: self.height.unwrap_or(0.0),
                rotation: self.rotation.unwrap_or(0.0),
            },
            EntityKind::MText => {
                let rotation = self.rotation.or_else(|| {
                    self.secondary
                        .first()
                        .filter(|dir| dir.x().abs() > f64::EPSILON || dir.y().abs() > f64::EPSILON)
                        .map(|dir| dir.y().atan2(dir.x()))
                });
                let content: String = self.fragments.concat();
                RawGeometry::MText {
                    position: anchor(&self.primary)?,
                    text: decode_special_codes(&decode_mtext_content(&content)),
                    height: self.height.unwrap_or(0.0),
                    rotation: rotation.unwrap_or(0.0),
                }
            }
            EntityKind::Ellipse => {
                let center = anchor(&self.primary)?;
                let axis = self
                    .secondary
                    .first()
                    .ok_or_else(|| "ELLIPSE 缺少主轴端点（组码 11/21）".to_string())?;
                if axis.x().abs() < f64::EPSILON && axis.y().abs() < f64::EPSILON {
                    return Err("ELLIPSE 主轴向量长度为 0".to_string());
                }
                let axis_ratio = self.axis_ratio.unwrap_or(1.0);
                if axis_ratio <= 0.0 {
                    return Err(format!("ELLIPSE 半径比必须为正数，实际为 {axis_ratio}"));
                }
                RawGeometry::Ellipse {
                    center,
                    major_axis_endpoint: Vector2::new(axis.x(), axis.y()),
                    axis_ratio,
                    start_parameter: self.start_parameter.unwrap_or(0.0),
                    end_parameter: self.end_parameter.unwrap_or(TAU),
                }
            }
            EntityKind::Spline => RawGeometry::Spline {
                control_points: std::mem::take(&mut self.primary.points),
                fit_points: std::mem::take(&mut self.secondary.points),
                closed: self.flags & 0x01 != 0,
            },
            EntityKind::Solid => {
                let corners: Vec<Point3> = [&self.primary, &self.secondary, &self.third, &self.fourth]
                    .into_iter()
                    .filter_map(PointSeq::first)
                    .collect();
                if corners.len() < 3 {
                    return Err(format!("SOLID 只有 {} 个角点", corners.len()));
                }
                RawGeometry::Solid { corners }
            }
            EntityKind::Insert => RawGeometry::Insert {
                position: anchor(&self.primary)?,
                block_name: self.block_name.take(),
            },
            EntityKind::Dimension => {
                let text_midpoint = self.secondary.first();
                let definition_point = self
                    .primary
                    .first()
                    .or(text_midpoint)
                    .ok_or_else(|| "DIMENSION 缺少定义点（组码 10/20）".to_string())?;
                let text = (!self.fragments.is_empty())
                    .then(|| decode_special_codes(&self.fragments.concat()));
                RawGeometry::Dimension {
                    definition_point,
                    text_midpoint,
                    text,
                }
            }
            EntityKind::Point => RawGeometry::Point {
                position: anchor(&self.primary)?,
            },
            EntityKind::Hatch | EntityKind::Unknown => {
                return Err(format!("{name} 无法按通用规则组装"));
            }
        };
        Ok(geometry)
    }

    fn valid_radius(&self) -> Result<f64, String> {
        let name = self.kind.dxf_name();
        match self.radius {
            Some(radius) if radius >= 0.0 => Ok(radius),
            Some(radius) => Err(format!("{name} 半径为负数（{radius}）")),
            None => Err(format!("{name} 缺少有效半径（组码 40）")),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum HatchPhase {
    #[default]
    Header,
    AwaitLoop,
    FirstLoop,
    Done,
}

/// HATCH 只保留第一条边界环。多段线环直接取顶点与 bulge；
/// 边界环中的直线边取端点，圆弧边换算为带 bulge 的顶点，其余边类型忽略。
#[derive(Debug, Default)]
struct HatchBoundaryBuilder {
    phase: HatchPhase,
    polyline_loop: bool,
    vertices: Vec<PolylineVertex>,
    pending: PointSeq,
    edge_type: i32,
    edge_start: PointSeq,
    edge_end: PointSeq,
    arc_radius: Option<f64>,
    arc_start: Option<f64>,
    arc_end: Option<f64>,
    arc_ccw: bool,
    last_edge_end: Option<Point2>,
}

impl HatchBoundaryBuilder {
    fn apply(&mut self, code: i32, value: &str) {
        match self.phase {
            HatchPhase::Header => {
                if code == 91 {
                    self.phase = HatchPhase::AwaitLoop;
                }
            }
            HatchPhase::AwaitLoop => match code {
                92 => {
                    let flags = parse_i32(value).unwrap_or(0);
                    self.polyline_loop = flags & 0x02 != 0;
                    self.phase = HatchPhase::FirstLoop;
                }
                75 => self.phase = HatchPhase::Done,
                _ => {}
            },
            HatchPhase::FirstLoop => match code {
                92 | 75 => {
                    self.flush_edge();
                    self.phase = HatchPhase::Done;
                }
                _ if self.polyline_loop => self.apply_polyline_code(code, value),
                _ => self.apply_edge_code(code, value),
            },
            HatchPhase::Done => {}
        }
    }

    fn apply_polyline_code(&mut self, code: i32, value: &str) {
        match code {
            10 => self.pending.x(parse_f64(value)),
            20 => {
                if self.pending.y(parse_f64(value)) {
                    if let Some(point) = self.pending.points.pop() {
                        self.vertices.push(PolylineVertex::new(point.xy()));
                    }
                }
            }
            42 => {
                if let Some(last) = self.vertices.last_mut() {
                    last.bulge = parse_f64(value).unwrap_or(0.0);
                }
            }
            _ => {}
        }
    }

    fn apply_edge_code(&mut self, code: i32, value: &str) {
        if code == 72 {
            self.flush_edge();
            self.edge_type = parse_i32(value).unwrap_or(0);
            return;
        }
        match (self.edge_type, code) {
            (1 | 2, 10) => self.edge_start.x(parse_f64(value)),
            (1 | 2, 20) => {
                self.edge_start.y(parse_f64(value));
            }
            (1, 11) => self.edge_end.x(parse_f64(value)),
            (1, 21) => {
                self.edge_end.y(parse_f64(value));
            }
            (2, 40) => self.arc_radius = parse_f64(value),
            (2, 50) => self.arc_start = parse_f64(value),
            (2, 51) => self.arc_end = parse_f64(value),
            (2, 73) => self.arc_ccw = parse_i32(value).unwrap_or(1) != 0,
            _ => {}
        }
    }

    fn flush_edge(&mut self) {
        let edge_type = std::mem::take(&mut self.edge_type);
        let start = std::mem::take(&mut self.edge_start).first();
        let end = std::mem::take(&mut self.edge_end).first();
        let radius = self.arc_radius.take();
        let arc_start = self.arc_start.take();
        let arc_end = self.arc_end.take();
        let ccw = std::mem::replace(&mut self.arc_ccw, true);

        match edge_type {
            1 => {
                if let (Some(start), Some(end)) = (start, end) {
                    self.push_edge(start.xy(), end.xy(), 0.0);
                }
            }
            2 => {
                let (Some(center), Some(radius)) = (start, radius) else {
                    return;
                };
                let a0 = arc_start.unwrap_or(0.0).to_radians();
                let a1 = arc_end.unwrap_or(360.0).to_radians();
                let mut sweep = (a1 - a0).rem_euclid(TAU);
                if sweep <= BULGE_EPSILON {
                    sweep = TAU;
                }
                // 顺时针圆弧边在 DXF 中以镜像角度存储
                let (start_angle, sweep) = if ccw { (a0, sweep) } else { (-a0, -sweep) };
                let center = center.xy();
                let at = |angle: f64| {
                    Point2::new(
                        center.x() + radius * angle.cos(),
                        center.y() + radius * angle.sin(),
                    )
                };
                if sweep.abs() > PI {
                    let half = sweep / 2.0;
                    let bulge = (half / 4.0).tan();
                    self.push_edge(at(start_angle), at(start_angle + half), bulge);
                    self.push_edge(at(start_angle + half), at(start_angle + sweep), bulge);
                } else {
                    self.push_edge(at(start_angle), at(start_angle + sweep), (sweep / 4.0).tan());
                }
            }
            _ => {}
        }
    }

    fn push_edge(&mut self, start: Point2, end: Point2, bulge: f64) {
        if let Some(previous_end) = self.last_edge_end {
            if previous_end.distance(start) > BULGE_EPSILON {
                self.vertices.push(PolylineVertex::new(previous_end));
            }
        }
        self.vertices.push(PolylineVertex::with_bulge(start, bulge));
        self.last_edge_end = Some(end);
    }

    fn finish(mut self) -> Option<PolylineRecord> {
        if self.phase == HatchPhase::FirstLoop {
            self.flush_edge();
        }
        let first = self.vertices.first().map(|vertex| vertex.position);
        if let (Some(end), Some(first)) = (self.last_edge_end, first) {
            if end.distance(first) > BULGE_EPSILON {
                self.vertices.push(PolylineVertex::new(end));
            }
        }
        if self.vertices.is_empty() {
            None
        } else {
            Some(PolylineRecord::new(self.vertices, true))
        }
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, ParseIssue> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let code = code_line
            .trim()
            .parse::<i32>()
            .map_err(|_| ParseIssue::BrokenStream {
                line: self.line_number,
                message: format!("组码 \"{}\" 无法解析为整数", code_line.trim()),
            })?;

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(ParseIssue::BrokenStream {
                    line: self.line_number,
                    message: format!("文件提前结束，组码 {code} 缺少对应的值行"),
                });
            }
        };

        Ok(Some((code, value_line.trim_end_matches('\r').to_string())))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }

    #[inline]
    fn line_number(&self) -> usize {
        self.line_number
    }
}

fn parse_f64(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_i32(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    trimmed.parse::<i32>().ok().or_else(|| {
        // 个别写出程序会把整数写成 "1.0"
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && value.fract() == 0.0)
            .map(|value| value as i32)
    })
}

fn parse_i16(raw: &str) -> Option<i16> {
    parse_i32(raw).and_then(|value| i16::try_from(value).ok())
}

fn parse_true_color(raw: &str) -> Option<Rgb> {
    parse_i32(raw)
        .filter(|value| *value >= 0)
        .map(|value| Rgb::from_u24(value as u32))
}

fn decode_mtext_content(raw: &str) -> String {
    let mut result = String::new();
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('P') => result.push('\n'),
                Some('~') => result.push(' '),
                Some(escaped @ ('\\' | '{' | '}')) => result.push(escaped),
                Some('S') => {
                    // 堆叠分数 \S1^2; 按 "1/2" 输出
                    for next in chars.by_ref() {
                        match next {
                            ';' => break,
                            '^' | '#' => result.push('/'),
                            other => result.push(other),
                        }
                    }
                }
                Some('f' | 'F' | 'H' | 'C' | 'c' | 'W' | 'Q' | 'T' | 'A' | 'p') => {
                    for next in chars.by_ref() {
                        if next == ';' {
                            break;
                        }
                    }
                }
                Some('L' | 'l' | 'O' | 'o' | 'K' | 'k') => {}
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            },
            '{' | '}' => {}
            _ => result.push(ch),
        }
    }
    result
}

/// 处理 `%%d`、`%%c`、`%%p` 等控制码。
fn decode_special_codes(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(index) = rest.find("%%") {
        result.push_str(&rest[..index]);
        let tail = &rest[index + 2..];
        let mut chars = tail.chars();
        match chars.next() {
            Some('d' | 'D') => result.push('°'),
            Some('c' | 'C') => result.push('Ø'),
            Some('p' | 'P') => result.push('±'),
            Some('%') => result.push('%'),
            Some('u' | 'U' | 'o' | 'O') => {}
            Some(other) => {
                result.push_str("%%");
                result.push(other);
            }
            None => {
                result.push_str("%%");
                break;
            }
        }
        rest = chars.as_str();
    }
    result.push_str(rest);
    result
}
