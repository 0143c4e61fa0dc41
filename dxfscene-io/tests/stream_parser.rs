use std::f64::consts::{FRAC_PI_2, TAU};
use std::io::Write;
use std::path::PathBuf;

use dxfscene_core::{
    color::Rgb,
    drawing::DrawingUnits,
    geometry::{Point2, Point3},
    record::{EntityKind, RawGeometry},
};
use dxfscene_io::{DrawingLoader, DxfFacade, IoError, ParseIssue, parse_drawing, parse_stream};

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

/// 把组码/值对拼成 ENTITIES 段文本。
fn entities(pairs: &[(i32, &str)]) -> String {
    let mut text = String::from("  0\nSECTION\n  2\nENTITIES\n");
    for (code, value) in pairs {
        text.push_str(&format!("{code:>3}\n{value}\n"));
    }
    text.push_str("  0\nENDSEC\n  0\nEOF\n");
    text
}

#[test]
fn load_floor_plan_fixture() {
    let drawing = DxfFacade::new()
        .load(&fixture("floor_plan.dxf"))
        .expect("读取 DXF 失败");

    assert_eq!(drawing.header.version.as_deref(), Some("AC1027"));
    assert_eq!(drawing.header.units, DrawingUnits::Millimeters);
    assert!(drawing.issues.is_empty(), "不应产生诊断: {:?}", drawing.issues);

    let kinds: Vec<EntityKind> = drawing.records.iter().map(|record| record.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            EntityKind::Line,
            EntityKind::LwPolyline,
            EntityKind::Circle,
            EntityKind::Arc,
            EntityKind::Text,
            EntityKind::MText,
            EntityKind::Insert,
            EntityKind::Point,
        ]
    );

    let wall = drawing.layers.get("a-wall").expect("缺少 A-WALL 图层");
    assert_eq!(wall.color.index, Some(5));
    let hidden = drawing.layers.get("HIDDEN").expect("缺少 Hidden 图层");
    assert!(!hidden.is_visible);
    assert!(hidden.is_frozen);
    assert_eq!(hidden.color.index, Some(3));
    assert_eq!(drawing.layers.len(), 3);
}

#[test]
fn floor_plan_fields_are_mapped_per_kind() {
    let drawing = DxfFacade::new()
        .load(&fixture("floor_plan.dxf"))
        .expect("读取 DXF 失败");
    let records = &drawing.records;

    match &records[0].geometry {
        RawGeometry::Line { start, end, .. } => {
            assert_eq!(*start, Some(Point3::new(0.0, 0.0, 0.0)));
            assert_eq!(*end, Some(Point3::new(4000.0, 0.0, 0.0)));
        }
        other => panic!("期望 LINE，实际为 {other:?}"),
    }
    assert_eq!(records[0].layer, "A-WALL");

    match &records[1].geometry {
        RawGeometry::LwPolyline(polyline) => {
            assert!(polyline.closed);
            assert_eq!(polyline.vertices.len(), 3);
            assert_eq!(polyline.vertices[1].position, Point2::new(10.0, 0.0));
            assert!((polyline.vertices[1].bulge - 1.0).abs() < 1e-12);
            assert!(polyline.vertices[2].bulge.abs() < 1e-12);
        }
        other => panic!("期望 LWPOLYLINE，实际为 {other:?}"),
    }
    assert_eq!(records[1].color.index, Some(1));

    match &records[3].geometry {
        RawGeometry::Arc {
            start_angle,
            end_angle,
            radius,
            ..
        } => {
            assert!(start_angle.abs() < 1e-12);
            assert!((end_angle - FRAC_PI_2).abs() < 1e-12);
            assert!((radius - 800.0).abs() < 1e-12);
        }
        other => panic!("期望 ARC，实际为 {other:?}"),
    }

    match &records[4].geometry {
        RawGeometry::Text { text, height, .. } => {
            assert_eq!(text, "90°");
            assert!((height - 250.0).abs() < 1e-12);
        }
        other => panic!("期望 TEXT，实际为 {other:?}"),
    }

    match &records[5].geometry {
        RawGeometry::MText { text, rotation, .. } => {
            assert_eq!(text, "Living\nRoom");
            assert!((rotation - FRAC_PI_2).abs() < 1e-12);
        }
        other => panic!("期望 MTEXT，实际为 {other:?}"),
    }

    match &records[6].geometry {
        RawGeometry::Insert {
            position,
            block_name,
        } => {
            assert_eq!(*position, Point3::new(500.0, 600.0, 0.0));
            assert_eq!(block_name.as_deref(), Some("DOOR"));
        }
        other => panic!("期望 INSERT，实际为 {other:?}"),
    }

    assert!(records[7].color.is_inherited());
}

#[test]
fn legacy_polyline_collects_vertices_until_seqend() {
    let drawing = DxfFacade::new()
        .load(&fixture("legacy_polyline.dxf"))
        .expect("读取 DXF 失败");

    assert_eq!(drawing.records.len(), 2);
    let outline = &drawing.records[0];
    assert_eq!(outline.layer, "Outline");
    match &outline.geometry {
        RawGeometry::Polyline(polyline) => {
            assert!(polyline.closed);
            let positions: Vec<Point2> = polyline.vertices.iter().map(|v| v.position).collect();
            assert_eq!(
                positions,
                vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(10.0, 0.0),
                    Point2::new(10.0, 10.0)
                ]
            );
            assert!((polyline.vertices[1].bulge - 1.0).abs() < 1e-12);
        }
        other => panic!("期望 POLYLINE，实际为 {other:?}"),
    }
    assert_eq!(drawing.records[1].layer, "After");

    assert!(matches!(
        drawing.issues.as_slice(),
        [ParseIssue::DroppedEntity { entity, .. }] if entity == "POLYLINE"
    ));
}

#[test]
fn bulge_of_unreadable_vertex_does_not_bend_its_neighbour() {
    let lightweight = entities(&[
        (0, "LWPOLYLINE"),
        (90, "3"),
        (70, "0"),
        (10, "0"),
        (20, "0"),
        (42, "0"),
        (10, "abc"),
        (20, "0"),
        (42, "1"),
        (10, "10"),
        (20, "10"),
        (42, "0"),
    ]);
    let legacy = entities(&[
        (0, "POLYLINE"),
        (66, "1"),
        (70, "0"),
        (0, "VERTEX"),
        (10, "0"),
        (20, "0"),
        (0, "VERTEX"),
        (10, "abc"),
        (20, "0"),
        (42, "1"),
        (0, "VERTEX"),
        (10, "10"),
        (20, "10"),
        (0, "SEQEND"),
    ]);

    for text in [lightweight, legacy] {
        let records = parse_stream(&text);
        assert_eq!(records.len(), 1);
        let polyline = match &records[0].geometry {
            RawGeometry::LwPolyline(polyline) | RawGeometry::Polyline(polyline) => polyline,
            other => panic!("期望多段线，实际为 {other:?}"),
        };
        let positions: Vec<Point2> = polyline.vertices.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![Point2::new(0.0, 0.0), Point2::new(10.0, 10.0)]);
        assert!(polyline.vertices.iter().all(|vertex| vertex.bulge == 0.0));
    }
}

#[test]
fn dimension_and_spline_fields_are_mapped() {
    let records = parse_stream(&entities(&[
        (0, "DIMENSION"),
        (8, "DIM"),
        (2, "*D1"),
        (10, "5"),
        (20, "6"),
        (30, "0"),
        (11, "7"),
        (21, "8"),
        (31, "0"),
        (1, "%%c20"),
        (0, "DIMENSION"),
        (11, "1"),
        (21, "2"),
        (0, "SPLINE"),
        (8, "Curves"),
        (70, "8"),
        (71, "3"),
        (72, "7"),
        (40, "0"),
        (10, "0"),
        (20, "0"),
        (30, "0"),
        (10, "1"),
        (20, "2"),
        (30, "0"),
        (10, "3"),
        (20, "2"),
        (30, "0"),
        (11, "9"),
        (21, "9"),
        (31, "0"),
        (0, "SPLINE"),
        (70, "1"),
        (11, "0"),
        (21, "0"),
        (11, "4"),
        (21, "0"),
    ]));
    assert_eq!(records.len(), 4);

    assert_eq!(records[0].layer, "DIM");
    match &records[0].geometry {
        RawGeometry::Dimension {
            definition_point,
            text_midpoint,
            text,
        } => {
            assert_eq!(*definition_point, Point3::new(5.0, 6.0, 0.0));
            assert_eq!(*text_midpoint, Some(Point3::new(7.0, 8.0, 0.0)));
            assert_eq!(text.as_deref(), Some("Ø20"));
        }
        other => panic!("期望 DIMENSION，实际为 {other:?}"),
    }
    match &records[1].geometry {
        RawGeometry::Dimension {
            definition_point,
            text,
            ..
        } => {
            assert_eq!(*definition_point, Point3::new(1.0, 2.0, 0.0));
            assert!(text.is_none());
        }
        other => panic!("期望 DIMENSION，实际为 {other:?}"),
    }

    match &records[2].geometry {
        RawGeometry::Spline {
            control_points,
            fit_points,
            closed,
        } => {
            assert_eq!(
                control_points,
                &vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 2.0, 0.0),
                    Point3::new(3.0, 2.0, 0.0)
                ]
            );
            assert_eq!(fit_points, &vec![Point3::new(9.0, 9.0, 0.0)]);
            assert!(!closed);
        }
        other => panic!("期望 SPLINE，实际为 {other:?}"),
    }
    match &records[3].geometry {
        RawGeometry::Spline {
            control_points,
            fit_points,
            closed,
        } => {
            assert!(control_points.is_empty());
            assert_eq!(fit_points.len(), 2);
            assert!(closed);
        }
        other => panic!("期望 SPLINE，实际为 {other:?}"),
    }
}

#[test]
fn circle_with_non_numeric_radius_is_dropped() {
    let text = entities(&[
        (0, "CIRCLE"),
        (8, "0"),
        (10, "1"),
        (20, "2"),
        (30, "0"),
        (40, "abc"),
        (0, "CIRCLE"),
        (8, "0"),
        (10, "5"),
        (20, "5"),
        (40, "2.5"),
    ]);
    let drawing = parse_drawing(&text);

    assert_eq!(drawing.records.len(), 1);
    match &drawing.records[0].geometry {
        RawGeometry::Circle { center, radius } => {
            assert_eq!(*center, Point3::new(5.0, 5.0, 0.0));
            assert!((radius - 2.5).abs() < 1e-12);
        }
        other => panic!("期望 CIRCLE，实际为 {other:?}"),
    }
    assert!(matches!(
        drawing.issues.as_slice(),
        [ParseIssue::DroppedEntity { entity, .. }] if entity == "CIRCLE"
    ));
}

#[test]
fn broken_stream_keeps_records_before_the_break() {
    let text = "  0\nSECTION\n  2\nENTITIES\n  0\nLINE\n  8\nA\n 10\n0\n 20\n0\n 11\n1\n 21\n1\n  0\nPOINT\n 10\n3\n 20\n4\nnot-a-code\n???\n  0\nLINE\n";
    let drawing = parse_drawing(text);

    let kinds: Vec<EntityKind> = drawing.records.iter().map(|record| record.kind()).collect();
    assert_eq!(kinds, vec![EntityKind::Line, EntityKind::Point]);
    assert!(matches!(
        drawing.issues.as_slice(),
        [ParseIssue::BrokenStream { line: 23, .. }]
    ));
}

#[test]
fn missing_entities_section_yields_empty_result() {
    assert!(parse_stream("").is_empty());
    assert!(parse_stream("hello world").is_empty());

    let drawing = parse_drawing("  0\nSECTION\n  2\nHEADER\n  0\nENDSEC\n  0\nEOF\n");
    assert!(drawing.records.is_empty());
    assert_eq!(drawing.issues, vec![ParseIssue::MissingEntities]);
}

#[test]
fn unknown_entities_do_not_leak_fields() {
    let text = entities(&[
        (0, "3DFACE"),
        (8, "Faces"),
        (10, "9"),
        (20, "9"),
        (0, "POINT"),
        (10, "1"),
        (20, "2"),
    ]);
    let records = parse_stream(&text);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].layer, "0");
    assert_eq!(
        records[0].geometry,
        RawGeometry::Point {
            position: Point3::new(1.0, 2.0, 0.0)
        }
    );
}

#[test]
fn ellipse_defaults_and_validation() {
    let text = entities(&[
        (0, "ELLIPSE"),
        (10, "0"),
        (20, "0"),
        (11, "4"),
        (21, "0"),
        (0, "ELLIPSE"),
        (10, "0"),
        (20, "0"),
        (11, "4"),
        (21, "0"),
        (40, "-0.5"),
        (0, "ELLIPSE"),
        (10, "0"),
        (20, "0"),
        (11, "0"),
        (21, "0"),
        (40, "0.5"),
    ]);
    let drawing = parse_drawing(&text);

    assert_eq!(drawing.records.len(), 1);
    match &drawing.records[0].geometry {
        RawGeometry::Ellipse {
            axis_ratio,
            start_parameter,
            end_parameter,
            ..
        } => {
            assert!((axis_ratio - 1.0).abs() < 1e-12);
            assert!(start_parameter.abs() < 1e-12);
            assert!((end_parameter - TAU).abs() < 1e-12);
        }
        other => panic!("期望 ELLIPSE，实际为 {other:?}"),
    }
    assert_eq!(drawing.issues.len(), 2);
}

#[test]
fn true_color_overrides_index() {
    let text = entities(&[
        (0, "LINE"),
        (62, "1"),
        (420, "65280"),
        (10, "0"),
        (20, "0"),
        (11, "1"),
        (21, "0"),
    ]);
    let records = parse_stream(&text);
    assert_eq!(records[0].color.true_color, Some(Rgb::new(0, 255, 0)));
    assert_eq!(records[0].color.index, Some(1));
}

#[test]
fn solid_and_hatch_boundaries() {
    let text = entities(&[
        (0, "SOLID"),
        (10, "0"),
        (20, "0"),
        (11, "1"),
        (21, "0"),
        (12, "0"),
        (22, "1"),
        (13, "1"),
        (23, "1"),
        (0, "HATCH"),
        (8, "Fill"),
        (10, "0"),
        (20, "0"),
        (30, "0"),
        (2, "SOLID"),
        (70, "1"),
        (91, "1"),
        (92, "2"),
        (72, "0"),
        (73, "1"),
        (93, "4"),
        (10, "0"),
        (20, "0"),
        (10, "2"),
        (20, "0"),
        (10, "2"),
        (20, "2"),
        (10, "0"),
        (20, "2"),
        (97, "0"),
        (75, "0"),
        (98, "0"),
    ]);
    let records = parse_stream(&text);
    assert_eq!(records.len(), 2);

    match &records[0].geometry {
        RawGeometry::Solid { corners } => assert_eq!(corners.len(), 4),
        other => panic!("期望 SOLID，实际为 {other:?}"),
    }
    match &records[1].geometry {
        RawGeometry::Hatch {
            boundary: Some(boundary),
        } => {
            assert!(boundary.closed);
            assert_eq!(boundary.vertices.len(), 4);
            assert_eq!(boundary.vertices[2].position, Point2::new(2.0, 2.0));
        }
        other => panic!("期望带边界的 HATCH，实际为 {other:?}"),
    }
    assert_eq!(records[1].layer, "Fill");
}

#[test]
fn records_serialize_with_kind_tags() {
    let records = parse_stream(&entities(&[(0, "POINT"), (10, "1"), (20, "2")]));
    let json = serde_json::to_value(&records).expect("序列化失败");
    assert_eq!(json[0]["layer"], "0");
    assert!(json[0]["geometry"].get("Point").is_some());
}

#[test]
fn facade_rejects_oversized_and_binary_files() {
    let mut large = tempfile::NamedTempFile::new().expect("创建临时文件失败");
    large
        .write_all(entities(&[(0, "POINT"), (10, "0"), (20, "0")]).as_bytes())
        .expect("写入临时文件失败");
    let err = DxfFacade::new()
        .with_max_bytes(16)
        .load(large.path())
        .expect_err("超过上限应报错");
    assert!(matches!(err, IoError::TooLarge { limit: 16, .. }));
    assert!(err.to_string().contains("over the import limit of 16 bytes"));

    let mut binary = tempfile::NamedTempFile::new().expect("创建临时文件失败");
    binary
        .write_all(b"AutoCAD Binary DXF\r\n\x1a\x00")
        .expect("写入临时文件失败");
    let err = DxfFacade::new()
        .load(binary.path())
        .expect_err("二进制 DXF 应报错");
    assert!(matches!(err, IoError::BinaryDxf(_)));
    assert!(err.to_string().starts_with("binary DXF is not supported"));

    let missing = fixture("does_not_exist.dxf");
    let err = DxfFacade::new().load(&missing).expect_err("文件不存在应报错");
    assert!(matches!(err, IoError::ReadError { .. }));
    assert!(err.to_string().starts_with("failed to read file"));
}
