pub mod geometry {
    use glam::{DVec2, DVec3};
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，对应 DXF 绘图平面上的坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于椭圆主轴等相对量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 三维点。DXF 原始记录中 Z 为标高，输出到场景后表示场景坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point3(pub DVec3);

    impl Point3 {
        pub const ORIGIN: Point3 = Point3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn with_z(self, z: f64) -> Self {
            Self(DVec3::new(self.0.x, self.0.y, z))
        }

        /// 丢弃 Z，投影回绘图平面。
        #[inline]
        pub fn xy(self) -> Point2 {
            Point2::new(self.0.x, self.0.y)
        }

        #[inline]
        pub fn distance(self, other: Point3) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    impl From<DVec3> for Point3 {
        fn from(value: DVec3) -> Self {
            Self(value)
        }
    }

    /// 三维向量，目前只用于表示范围尺寸。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector3(pub DVec3);

    impl Vector3 {
        pub const ZERO: Vector3 = Vector3(DVec3::ZERO);

        #[inline]
        pub fn new(x: f64, y: f64, z: f64) -> Self {
            Self(DVec3::new(x, y, z))
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn z(self) -> f64 {
            self.0.z
        }

        #[inline]
        pub fn as_vec3(self) -> DVec3 {
            self.0
        }
    }

    /// 轴对齐边界框累加器。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds3D {
        min: Point3,
        max: Point3,
    }

    impl Bounds3D {
        #[inline]
        pub fn new(min: Point3, max: Point3) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
                max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y() || self.min.z() > self.max.z()
        }

        #[inline]
        pub fn min(&self) -> Point3 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point3 {
            self.max
        }

        pub fn include_point(&mut self, point: Point3) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            self.min = Point3::from(self.min.as_vec3().min(point.as_vec3()));
            self.max = Point3::from(self.max.as_vec3().max(point.as_vec3()));
        }

        pub fn include_points<'a, I>(&mut self, points: I)
        where
            I: IntoIterator<Item = &'a Point3>,
        {
            for point in points {
                self.include_point(*point);
            }
        }

        #[inline]
        pub fn center(&self) -> Point3 {
            debug_assert!(!self.is_empty());
            Point3::from((self.min.as_vec3() + self.max.as_vec3()) * 0.5)
        }

        #[inline]
        pub fn size(&self) -> Vector3 {
            debug_assert!(!self.is_empty());
            Vector3(self.max.as_vec3() - self.min.as_vec3())
        }
    }
}

pub mod color {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    /// 已解析的显示颜色。序列化为 `#rrggbb`，渲染端无需再理解 DXF 颜色索引。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(into = "String", try_from = "String")]
    pub struct Rgb {
        pub r: u8,
        pub g: u8,
        pub b: u8,
    }

    impl Rgb {
        #[inline]
        pub const fn new(r: u8, g: u8, b: u8) -> Self {
            Self { r, g, b }
        }

        /// 从 `0xRRGGBB` 形式的整数构造（DXF 组码 420 即此格式）。
        #[inline]
        pub const fn from_u24(value: u32) -> Self {
            Self {
                r: ((value >> 16) & 0xFF) as u8,
                g: ((value >> 8) & 0xFF) as u8,
                b: (value & 0xFF) as u8,
            }
        }

        #[inline]
        pub const fn to_u24(self) -> u32 {
            ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
        }

        pub fn parse_hex(raw: &str) -> Option<Self> {
            let digits = raw.trim().trim_start_matches('#');
            if digits.len() != 6 {
                return None;
            }
            u32::from_str_radix(digits, 16).ok().map(Self::from_u24)
        }
    }

    impl fmt::Display for Rgb {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        }
    }

    impl From<Rgb> for String {
        fn from(value: Rgb) -> Self {
            value.to_string()
        }
    }

    impl TryFrom<String> for Rgb {
        type Error = String;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            Rgb::parse_hex(&value).ok_or_else(|| format!("无法解析颜色值 \"{value}\""))
        }
    }
}

pub mod record {
    use serde::{Deserialize, Serialize};

    use crate::color::Rgb;
    use crate::geometry::{Point2, Point3, Vector2};

    /// 解析器识别的实体类型。未识别的类型名统一落入 `Unknown`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum EntityKind {
        Line,
        LwPolyline,
        Polyline,
        Circle,
        Arc,
        Text,
        MText,
        Ellipse,
        Spline,
        Solid,
        Insert,
        Hatch,
        Dimension,
        Point,
        Unknown,
    }

    impl EntityKind {
        pub fn from_name(name: &str) -> Self {
            match name.trim() {
                "LINE" => EntityKind::Line,
                "LWPOLYLINE" => EntityKind::LwPolyline,
                "POLYLINE" => EntityKind::Polyline,
                "CIRCLE" => EntityKind::Circle,
                "ARC" => EntityKind::Arc,
                "TEXT" => EntityKind::Text,
                "MTEXT" => EntityKind::MText,
                "ELLIPSE" => EntityKind::Ellipse,
                "SPLINE" => EntityKind::Spline,
                "SOLID" => EntityKind::Solid,
                "INSERT" => EntityKind::Insert,
                "HATCH" => EntityKind::Hatch,
                "DIMENSION" => EntityKind::Dimension,
                "POINT" => EntityKind::Point,
                _ => EntityKind::Unknown,
            }
        }

        pub fn dxf_name(self) -> &'static str {
            match self {
                EntityKind::Line => "LINE",
                EntityKind::LwPolyline => "LWPOLYLINE",
                EntityKind::Polyline => "POLYLINE",
                EntityKind::Circle => "CIRCLE",
                EntityKind::Arc => "ARC",
                EntityKind::Text => "TEXT",
                EntityKind::MText => "MTEXT",
                EntityKind::Ellipse => "ELLIPSE",
                EntityKind::Spline => "SPLINE",
                EntityKind::Solid => "SOLID",
                EntityKind::Insert => "INSERT",
                EntityKind::Hatch => "HATCH",
                EntityKind::Dimension => "DIMENSION",
                EntityKind::Point => "POINT",
                EntityKind::Unknown => "UNKNOWN",
            }
        }
    }

    /// 实体级颜色。`index` 为 256（BYLAYER）、0（BYBLOCK）或缺失时视为继承图层。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
    pub struct EntityColor {
        pub index: Option<i16>,
        pub true_color: Option<Rgb>,
    }

    impl EntityColor {
        pub const BY_BLOCK: i16 = 0;
        pub const BY_LAYER: i16 = 256;

        #[inline]
        pub fn by_layer() -> Self {
            Self::default()
        }

        #[inline]
        pub fn from_index(index: i16) -> Self {
            Self {
                index: Some(index),
                true_color: None,
            }
        }

        #[inline]
        pub fn from_rgb(rgb: Rgb) -> Self {
            Self {
                index: None,
                true_color: Some(rgb),
            }
        }

        /// 实体自身没有可用颜色，需要向图层回退。
        pub fn is_inherited(&self) -> bool {
            if self.true_color.is_some() {
                return false;
            }
            match self.index {
                None => true,
                Some(index) => index == Self::BY_LAYER || index == Self::BY_BLOCK,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// LWPOLYLINE、旧式 POLYLINE 以及 HATCH 边界共用的顶点序列。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct PolylineRecord {
        pub vertices: Vec<PolylineVertex>,
        pub closed: bool,
    }

    impl PolylineRecord {
        pub fn new(vertices: Vec<PolylineVertex>, closed: bool) -> Self {
            Self { vertices, closed }
        }
    }

    /// 各实体类型的几何字段。与 `EntityKind` 一一对应（`Unknown` 不会产出记录）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum RawGeometry {
        Line {
            /// 部分写出程序以顶点数组形式给出 LINE，两点以上时优先使用。
            vertices: Vec<Point3>,
            start: Option<Point3>,
            end: Option<Point3>,
        },
        LwPolyline(PolylineRecord),
        Polyline(PolylineRecord),
        Circle {
            center: Point3,
            radius: f64,
        },
        /// 角度单位为弧度，按逆时针方向从起始角扫到终止角。
        Arc {
            center: Point3,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        },
        Text {
            position: Point3,
            text: String,
            height: f64,
            rotation: f64,
        },
        MText {
            position: Point3,
            text: String,
            height: f64,
            rotation: f64,
        },
        /// 主轴端点相对圆心给出；参数范围缺省为整圈。
        Ellipse {
            center: Point3,
            major_axis_endpoint: Vector2,
            axis_ratio: f64,
            start_parameter: f64,
            end_parameter: f64,
        },
        Spline {
            control_points: Vec<Point3>,
            fit_points: Vec<Point3>,
            closed: bool,
        },
        /// 角点保持 DXF 存储顺序（第 3、4 点与绘制顺序相反）。
        Solid {
            corners: Vec<Point3>,
        },
        Insert {
            position: Point3,
            block_name: Option<String>,
        },
        Hatch {
            boundary: Option<PolylineRecord>,
        },
        Dimension {
            definition_point: Point3,
            text_midpoint: Option<Point3>,
            text: Option<String>,
        },
        Point {
            position: Point3,
        },
    }

    impl RawGeometry {
        pub fn kind(&self) -> EntityKind {
            match self {
                RawGeometry::Line { .. } => EntityKind::Line,
                RawGeometry::LwPolyline(_) => EntityKind::LwPolyline,
                RawGeometry::Polyline(_) => EntityKind::Polyline,
                RawGeometry::Circle { .. } => EntityKind::Circle,
                RawGeometry::Arc { .. } => EntityKind::Arc,
                RawGeometry::Text { .. } => EntityKind::Text,
                RawGeometry::MText { .. } => EntityKind::MText,
                RawGeometry::Ellipse { .. } => EntityKind::Ellipse,
                RawGeometry::Spline { .. } => EntityKind::Spline,
                RawGeometry::Solid { .. } => EntityKind::Solid,
                RawGeometry::Insert { .. } => EntityKind::Insert,
                RawGeometry::Hatch { .. } => EntityKind::Hatch,
                RawGeometry::Dimension { .. } => EntityKind::Dimension,
                RawGeometry::Point { .. } => EntityKind::Point,
            }
        }
    }

    /// 解析器产出的中间记录，仅供几何重建使用。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RawEntityRecord {
        pub layer: String,
        pub color: EntityColor,
        pub geometry: RawGeometry,
    }

    impl RawEntityRecord {
        pub const DEFAULT_LAYER: &'static str = "0";

        pub fn new(geometry: RawGeometry) -> Self {
            Self {
                layer: Self::DEFAULT_LAYER.to_string(),
                color: EntityColor::by_layer(),
                geometry,
            }
        }

        pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
            self.layer = layer.into();
            self
        }

        pub fn with_color(mut self, color: EntityColor) -> Self {
            self.color = color;
            self
        }

        #[inline]
        pub fn kind(&self) -> EntityKind {
            self.geometry.kind()
        }
    }
}

pub mod drawing {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use crate::record::EntityColor;

    /// `$INSUNITS` 记录的图形单位。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub enum DrawingUnits {
        #[default]
        Unitless,
        Inches,
        Feet,
        Miles,
        Millimeters,
        Centimeters,
        Meters,
        Kilometers,
        Microinches,
        Mils,
        Yards,
        Angstroms,
        Nanometers,
        Microns,
        Decimeters,
        Other(i16),
    }

    impl DrawingUnits {
        pub fn from_code(code: i16) -> Self {
            match code {
                0 => DrawingUnits::Unitless,
                1 => DrawingUnits::Inches,
                2 => DrawingUnits::Feet,
                3 => DrawingUnits::Miles,
                4 => DrawingUnits::Millimeters,
                5 => DrawingUnits::Centimeters,
                6 => DrawingUnits::Meters,
                7 => DrawingUnits::Kilometers,
                8 => DrawingUnits::Microinches,
                9 => DrawingUnits::Mils,
                10 => DrawingUnits::Yards,
                11 => DrawingUnits::Angstroms,
                12 => DrawingUnits::Nanometers,
                13 => DrawingUnits::Microns,
                14 => DrawingUnits::Decimeters,
                other => DrawingUnits::Other(other),
            }
        }

        /// 每个图形单位对应的米数；无单位或未知代码返回 `None`。
        pub fn meters_per_unit(self) -> Option<f64> {
            let factor = match self {
                DrawingUnits::Unitless | DrawingUnits::Other(_) => return None,
                DrawingUnits::Inches => 0.0254,
                DrawingUnits::Feet => 0.3048,
                DrawingUnits::Miles => 1609.344,
                DrawingUnits::Millimeters => 0.001,
                DrawingUnits::Centimeters => 0.01,
                DrawingUnits::Meters => 1.0,
                DrawingUnits::Kilometers => 1000.0,
                DrawingUnits::Microinches => 0.0254e-6,
                DrawingUnits::Mils => 0.0254e-3,
                DrawingUnits::Yards => 0.9144,
                DrawingUnits::Angstroms => 1e-10,
                DrawingUnits::Nanometers => 1e-9,
                DrawingUnits::Microns => 1e-6,
                DrawingUnits::Decimeters => 0.1,
            };
            Some(factor)
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct DrawingHeader {
        pub version: Option<String>,
        pub units: DrawingUnits,
    }

    /// 图层记录。颜色保持 DXF 原始形式（ACI 索引或真彩色），由重建阶段解析。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LayerInfo {
        pub name: String,
        pub color: EntityColor,
        pub is_visible: bool,
        pub is_frozen: bool,
    }

    impl LayerInfo {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                color: EntityColor::by_layer(),
                is_visible: true,
                is_frozen: false,
            }
        }
    }

    /// TABLES 段中的图层表。图层名按 DXF 约定大小写不敏感。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct LayerTable {
        layers: BTreeMap<String, LayerInfo>,
    }

    impl LayerTable {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, layer: LayerInfo) {
            self.layers.insert(layer.name.to_ascii_uppercase(), layer);
        }

        pub fn get(&self, name: &str) -> Option<&LayerInfo> {
            self.layers.get(&name.to_ascii_uppercase())
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.layers.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.layers.is_empty()
        }
    }
}

pub mod render {
    use serde::{Deserialize, Serialize};

    use crate::color::Rgb;
    use crate::geometry::{Bounds3D, Point3, Vector3};
    use crate::record::EntityKind;

    /// 渲染端识别的图元类型。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum RenderKind {
        Line,
        Polyline,
        Circle,
        Arc,
        Text,
        Point,
    }

    impl RenderKind {
        pub fn as_str(self) -> &'static str {
            match self {
                RenderKind::Line => "line",
                RenderKind::Polyline => "polyline",
                RenderKind::Circle => "circle",
                RenderKind::Arc => "arc",
                RenderKind::Text => "text",
                RenderKind::Point => "point",
            }
        }
    }

    /// 重建后的最终图元。`points` 已处于场景坐标系，并已完成缩放与居中。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct RenderEntity {
        #[serde(rename = "type")]
        pub kind: RenderKind,
        pub points: Vec<Point3>,
        pub color: Rgb,
        pub layer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub radius: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub center: Option<Point3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text_height: Option<f64>,
        /// 文字方向，弧度，绘图平面内逆时针为正。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub rotation: Option<f64>,
        pub source: EntityKind,
    }

    impl RenderEntity {
        pub fn new(
            kind: RenderKind,
            points: Vec<Point3>,
            color: Rgb,
            layer: impl Into<String>,
            source: EntityKind,
        ) -> Self {
            Self {
                kind,
                points,
                color,
                layer: layer.into(),
                radius: None,
                center: None,
                text: None,
                text_height: None,
                rotation: None,
                source,
            }
        }
    }

    /// 整个文档的场景范围。绘图数据铺在水平面上，因此 `size.y` 通常为 0。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct DrawingBounds {
        pub min: Point3,
        pub max: Point3,
        pub center: Point3,
        pub size: Vector3,
    }

    impl DrawingBounds {
        /// 空文档使用的零范围。
        pub fn zero() -> Self {
            Self {
                min: Point3::ORIGIN,
                max: Point3::ORIGIN,
                center: Point3::ORIGIN,
                size: Vector3::ZERO,
            }
        }

        pub fn from_bounds(bounds: &Bounds3D) -> Self {
            if bounds.is_empty() {
                return Self::zero();
            }
            Self {
                min: bounds.min(),
                max: bounds.max(),
                center: bounds.center(),
                size: bounds.size(),
            }
        }

        pub fn of_entities(entities: &[RenderEntity]) -> Self {
            let mut bounds = Bounds3D::empty();
            for entity in entities {
                bounds.include_points(&entity.points);
            }
            Self::from_bounds(&bounds)
        }

        /// 水平面（X/Z）上的最大边长，用于自动缩放。
        #[inline]
        pub fn max_horizontal_size(&self) -> f64 {
            self.size.x().max(self.size.z())
        }
    }

    impl Default for DrawingBounds {
        fn default() -> Self {
            Self::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::color::Rgb;
    use super::drawing::{DrawingUnits, LayerInfo, LayerTable};
    use super::geometry::{Bounds3D, Point3};
    use super::record::{EntityColor, EntityKind, RawEntityRecord, RawGeometry};
    use super::render::{DrawingBounds, RenderEntity, RenderKind};

    #[test]
    fn bounds_accumulate_points() {
        let mut bounds = Bounds3D::empty();
        assert!(bounds.is_empty());
        bounds.include_point(Point3::new(1.0, 0.0, -2.0));
        bounds.include_point(Point3::new(-3.0, 0.0, 4.0));
        assert!(!bounds.is_empty());
        let center = bounds.center();
        assert!((center.x() + 1.0).abs() < 1e-12);
        assert!((center.z() - 1.0).abs() < 1e-12);
        let size = bounds.size();
        assert!((size.x() - 4.0).abs() < 1e-12);
        assert!(size.y().abs() < 1e-12);
        assert!((size.z() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn drawing_bounds_of_nothing_is_zero() {
        let bounds = DrawingBounds::of_entities(&[]);
        assert_eq!(bounds, DrawingBounds::zero());
        assert_eq!(bounds.max_horizontal_size(), 0.0);
    }

    #[test]
    fn rgb_round_trips_through_hex() {
        let color = Rgb::from_u24(0x1E3A5F);
        assert_eq!(color.to_string(), "#1e3a5f");
        assert_eq!(Rgb::parse_hex("#1E3A5F"), Some(color));
        assert_eq!(Rgb::parse_hex("12345"), None);
        assert_eq!(color.to_u24(), 0x1E3A5F);
    }

    #[test]
    fn render_entity_serializes_color_as_hex() {
        let entity = RenderEntity::new(
            RenderKind::Point,
            vec![Point3::ORIGIN],
            Rgb::new(255, 0, 0),
            "0",
            EntityKind::Point,
        );
        let json = serde_json::to_value(&entity).expect("序列化失败");
        assert_eq!(json["type"], "point");
        assert!(json.get("kind").is_none());
        assert_eq!(json["color"], "#ff0000");
        assert!(json.get("radius").is_none());
    }

    #[test]
    fn entity_color_inheritance_rules() {
        assert!(EntityColor::by_layer().is_inherited());
        assert!(EntityColor::from_index(256).is_inherited());
        assert!(EntityColor::from_index(0).is_inherited());
        assert!(!EntityColor::from_index(1).is_inherited());
        assert!(!EntityColor::from_rgb(Rgb::new(1, 2, 3)).is_inherited());
    }

    #[test]
    fn record_defaults_to_layer_zero() {
        let record = RawEntityRecord::new(RawGeometry::Point {
            position: Point3::ORIGIN,
        });
        assert_eq!(record.layer, "0");
        assert_eq!(record.kind(), EntityKind::Point);
        assert_eq!(EntityKind::from_name("LWPOLYLINE"), EntityKind::LwPolyline);
        assert_eq!(EntityKind::from_name("VIEWPORT"), EntityKind::Unknown);
    }

    #[test]
    fn layer_lookup_ignores_case() {
        let mut table = LayerTable::new();
        let mut walls = LayerInfo::new("A-Wall");
        walls.color = EntityColor::from_index(5);
        table.insert(walls);
        let found = table.get("A-WALL").expect("应能按大写名称找到图层");
        assert_eq!(found.name, "A-Wall");
        assert_eq!(found.color.index, Some(5));
        assert!(table.get("doors").is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn insunits_map_to_meters() {
        assert_eq!(DrawingUnits::from_code(4), DrawingUnits::Millimeters);
        assert_eq!(DrawingUnits::Millimeters.meters_per_unit(), Some(0.001));
        assert_eq!(DrawingUnits::from_code(0).meters_per_unit(), None);
        assert_eq!(DrawingUnits::from_code(99), DrawingUnits::Other(99));
    }
}
