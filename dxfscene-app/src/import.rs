use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

use dxfscene_config::AppConfig;
use dxfscene_core::drawing::DrawingHeader;
use dxfscene_engine::{ReconstructOptions, ReconstructedDrawing, Reconstructor, Tessellation};
use dxfscene_io::{DrawingLoader, DxfFacade, IoError, ParseIssue};
use tracing::{info, warn};

pub fn reconstruct_options(config: &AppConfig) -> ReconstructOptions {
    ReconstructOptions {
        tessellation: Tessellation {
            circle_segments: config.tessellation.circle_segments,
            arc_segments: config.tessellation.arc_segments,
        },
        target_envelope_size: config.scene.target_envelope_size,
        plane_offset: config.scene.plane_offset,
    }
}

/// 一次导入的全部产物。
#[derive(Debug)]
pub struct ImportOutcome {
    pub header: DrawingHeader,
    pub layer_count: usize,
    pub record_count: usize,
    pub issues: Vec<ParseIssue>,
    pub drawing: ReconstructedDrawing,
}

pub fn import_file(path: &Path, config: &AppConfig) -> Result<ImportOutcome, IoError> {
    let mut facade = DxfFacade::new();
    if let Some(limit) = config.import.size_limit() {
        facade = facade.with_max_bytes(limit);
    }
    let parsed = facade.load(path)?;
    for issue in &parsed.issues {
        warn!(path = %path.display(), %issue, "导入诊断");
    }

    let options = reconstruct_options(config);
    let reconstructor = match Reconstructor::new(options) {
        Ok(reconstructor) => reconstructor,
        Err(err) => {
            warn!(error = %err, "重建选项非法，按修正值继续");
            Reconstructor::lenient(&options)
        }
    };
    let drawing = reconstructor
        .with_layers(&parsed.layers)
        .reconstruct(&parsed.records);

    info!(
        path = %path.display(),
        entities = drawing.entities.len(),
        scale = drawing.transform.scale,
        "导入完成"
    );
    Ok(ImportOutcome {
        header: parsed.header,
        layer_count: parsed.layers.len(),
        record_count: parsed.records.len(),
        issues: parsed.issues,
        drawing,
    })
}

/// 终端输出用的摘要。
pub struct Summary<'a>(pub &'a ImportOutcome);

impl Summary<'_> {
    fn kind_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for entity in &self.0.drawing.entities {
            *counts.entry(entity.kind.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let outcome = self.0;
        let drawing = &outcome.drawing;
        writeln!(
            f,
            "版本: {}",
            outcome.header.version.as_deref().unwrap_or("未知")
        )?;
        let units = outcome.header.units;
        match units.meters_per_unit() {
            Some(meters) => writeln!(f, "单位: {units:?}（1 单位 = {meters} 米）")?,
            None => writeln!(f, "单位: {units:?}")?,
        }
        writeln!(f, "图层: {}", outcome.layer_count)?;
        writeln!(
            f,
            "实体: {} 条记录 → {} 个图元",
            outcome.record_count,
            drawing.entities.len()
        )?;
        for (kind, count) in self.kind_counts() {
            writeln!(f, "  {kind}: {count}")?;
        }
        let size = drawing.bounds.size;
        writeln!(
            f,
            "范围: {:.3} x {:.3}（缩放 {:.6}）",
            size.x(),
            size.z(),
            drawing.transform.scale
        )?;
        if !outcome.issues.is_empty() {
            writeln!(f, "诊断: {}", outcome.issues.len())?;
            for issue in &outcome.issues {
                writeln!(f, "  - {issue}")?;
            }
        }
        Ok(())
    }
}
