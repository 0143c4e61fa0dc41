use dxfscene_core::{color::Rgb, drawing::LayerTable, record::EntityColor};

/// 超出 ACI 表范围的索引使用的中性灰。
pub const NEUTRAL_GRAY: Rgb = Rgb::from_u24(0x808080);
/// 所有回退都失败时的默认颜色。
pub const DEFAULT_COLOR: Rgb = Rgb::from_u24(0x404040);

/// AutoCAD 颜色索引表，编译期生成。
pub static ACI_PALETTE: [Rgb; 256] = build_palette();

const STANDARD_COLORS: [u32; 9] = [
    0xFF0000, 0xFFFF00, 0x00FF00, 0x00FFFF, 0x0000FF, 0xFF00FF, 0xFFFFFF, 0x808080, 0xC0C0C0,
];
const GRAY_RAMP: [u8; 6] = [51, 80, 105, 130, 190, 255];
const SHADE_VALUES: [u32; 5] = [255, 165, 127, 76, 38];

/// 按图层名关键字匹配的常用制图配色，按顺序取第一个命中项。
const LAYER_HINTS: &[(&[&str], Rgb)] = &[
    (&["WALL", "墙"], Rgb::from_u24(0x1E3A5F)),
    (&["DOOR", "门"], Rgb::from_u24(0x8B4513)),
    (&["WINDOW", "GLAZ", "窗"], Rgb::from_u24(0x4FA3D9)),
    (&["DIM", "ANNO", "标注"], Rgb::from_u24(0x2E8B57)),
    (&["TEXT", "文字"], Rgb::from_u24(0x333333)),
    (&["FURN", "家具"], Rgb::from_u24(0x8E6C8A)),
    (&["GRID", "AXIS", "轴"], Rgb::from_u24(0xB0B0B0)),
];

const fn build_palette() -> [Rgb; 256] {
    let mut table = [Rgb::new(0, 0, 0); 256];

    let mut index = 0;
    while index < STANDARD_COLORS.len() {
        table[index + 1] = Rgb::from_u24(STANDARD_COLORS[index]);
        index += 1;
    }

    let mut index = 10;
    while index < 250 {
        table[index] = chromatic_entry(index);
        index += 1;
    }

    let mut index = 0;
    while index < GRAY_RAMP.len() {
        let level = GRAY_RAMP[index];
        table[250 + index] = Rgb::new(level, level, level);
        index += 1;
    }
    table
}

/// 10..=249：24 个色相，每个色相 5 档明度，偶数为纯色、奇数为淡色。
const fn chromatic_entry(index: usize) -> Rgb {
    let hue = (index - 10) / 10;
    let shade = (index - 10) % 10;
    let value = SHADE_VALUES[shade / 2];
    let step = (hue % 4) as u32;

    let (max, rising, falling, min) = if shade % 2 == 0 {
        (value, value * step / 4, value * (4 - step) / 4, 0)
    } else {
        (
            value,
            (4 * value + value * step) / 8,
            value * (8 - step) / 8,
            value / 2,
        )
    };

    let (r, g, b) = match hue / 4 {
        0 => (max, rising, min),
        1 => (falling, max, min),
        2 => (min, max, rising),
        3 => (min, falling, max),
        4 => (rising, min, max),
        _ => (max, min, falling),
    };
    Rgb::new(r as u8, g as u8, b as u8)
}

#[inline]
pub fn aci_color(index: i16) -> Rgb {
    usize::try_from(index)
        .ok()
        .and_then(|slot| ACI_PALETTE.get(slot).copied())
        .unwrap_or(NEUTRAL_GRAY)
}

/// 实体自身颜色：真彩色优先，其次为非继承的颜色索引。
pub fn explicit_color(color: &EntityColor) -> Option<Rgb> {
    if let Some(rgb) = color.true_color {
        return Some(rgb);
    }
    if color.is_inherited() {
        return None;
    }
    color.index.map(aci_color)
}

pub fn layer_hint(layer: &str) -> Option<Rgb> {
    let upper = layer.to_uppercase();
    LAYER_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| upper.contains(*keyword)))
        .map(|(_, color)| *color)
}

/// 实体颜色 → 图层表颜色 → 图层名关键字 → 默认色。
pub fn resolve_color(color: &EntityColor, layer: &str, layers: &LayerTable) -> Rgb {
    explicit_color(color)
        .or_else(|| {
            layers
                .get(layer)
                .and_then(|info| explicit_color(&info.color))
        })
        .or_else(|| layer_hint(layer))
        .unwrap_or(DEFAULT_COLOR)
}
