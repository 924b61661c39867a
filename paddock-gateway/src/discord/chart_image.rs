/// SVG-based chart rendering for Discord messages.
///
/// Builds SVG strings for standings tables, the compass scatter and the
/// corners-per-incident trend line, then rasterizes them via resvg.
/// Styled with a dark theme for inline display in Discord. Infinite values
/// never reach this module; the aggregator filters them before axis
/// ranges are computed.
use std::fmt::Write;
use std::sync::LazyLock;

use resvg::tiny_skia;
use resvg::usvg;
use tracing::warn;

use paddock_core::stats::{CompassPoint, CpiSample};

// ---------------------------------------------------------------------------
// Render scale: 2x SVG for crisp images on HiDPI / Discord scaling
// ---------------------------------------------------------------------------
const SCALE: f32 = 2.0;

// ---------------------------------------------------------------------------
// Table layout (logical pixels)
// ---------------------------------------------------------------------------
const FONT_SIZE: f32 = 14.0;
/// Average character width for a proportional sans-serif at FONT_SIZE,
/// slightly overestimated to prevent overflow.
const CHAR_WIDTH: f32 = 8.4;
const ROW_HEIGHT: f32 = 36.0;
const CELL_PAD_X: f32 = 14.0;
const CORNER_RADIUS: f32 = 10.0;
const HEADER_ACCENT_HEIGHT: f32 = 3.0;

// ---------------------------------------------------------------------------
// Plot layout
// ---------------------------------------------------------------------------
const PLOT_W: f32 = 640.0;
const PLOT_H: f32 = 420.0;
const MARGIN_LEFT: f32 = 64.0;
const MARGIN_RIGHT: f32 = 24.0;
const MARGIN_TOP: f32 = 44.0;
const MARGIN_BOTTOM: f32 = 52.0;
const TICKS: usize = 5;
const POINT_RADIUS: f32 = 4.5;

// ---------------------------------------------------------------------------
// Color palette: Discord dark theme
// ---------------------------------------------------------------------------
const BG_COLOR: &str = "#2B2D31";
const HEADER_BG: &str = "#1E1F22";
const HEADER_ACCENT: &str = "#5865F2";
const ZEBRA_EVEN: &str = "#2B2D31";
const ZEBRA_ODD: &str = "#2E3035";
const TEXT_COLOR: &str = "#D2D5D9";
const HEADER_TEXT: &str = "#FFFFFF";
const BORDER_COLOR: &str = "#3B3D44";
const GRID_COLOR: &str = "#3B3D44";
const LINE_COLOR: &str = "#57F287";

/// Series colors cycled for scatter points.
const POINT_COLORS: &[&str] = &[
    "#5865F2", "#57F287", "#FEE75C", "#EB459E", "#ED4245", "#3BA55D", "#FAA61A", "#00B0F4",
];

const FONT_FAMILY: &str = "'Inter', 'Segoe UI', 'Helvetica Neue', 'Arial', 'Noto Sans', sans-serif";

static SVG_OPTIONS: LazyLock<usvg::Options> = LazyLock::new(|| {
    let mut opt = usvg::Options::default();
    opt.fontdb_mut().load_system_fonts();
    opt
});

/// Eagerly initialize the system font database.
///
/// The underlying `LazyLock` scans every font file on the system, which can
/// block for seconds on large font collections. Calling this at startup
/// avoids stalling the tokio runtime on the first chart render.
pub(crate) fn init_fonts() {
    LazyLock::force(&SVG_OPTIONS);
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Render a header row plus data rows to PNG bytes.
///
/// Returns `None` if the table is empty or rasterization fails (missing
/// fonts).
pub(crate) fn render_table_png(headers: &[String], rows: &[Vec<String>]) -> Option<Vec<u8>> {
    if headers.is_empty() || rows.is_empty() {
        return None;
    }

    let col_count = headers.len();
    let mut col_chars: Vec<usize> = headers
        .iter()
        .map(|h| h.chars().count() + (h.chars().count() / 8).max(1))
        .collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            col_chars[i] = col_chars[i].max(cell.chars().count());
        }
    }

    let col_px: Vec<f32> = col_chars
        .iter()
        .map(|&n| n.max(3) as f32 * CHAR_WIDTH + 2.0 * CELL_PAD_X)
        .collect();
    let total_w = col_px.iter().sum::<f32>().ceil();
    let total_h = ((rows.len() + 1) as f32 * ROW_HEIGHT + HEADER_ACCENT_HEIGHT).ceil();

    let mut s = String::with_capacity(4096);
    let _ = write!(
        s,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{pw}" height="{ph}" viewBox="0 0 {total_w} {total_h}">"#,
        pw = (total_w * SCALE).ceil(),
        ph = (total_h * SCALE).ceil(),
    );
    let _ = write!(
        s,
        r#"<defs><clipPath id="table-clip"><rect width="{total_w}" height="{total_h}" rx="{CORNER_RADIUS}"/></clipPath></defs>"#,
    );
    let _ = write!(s, r#"<g clip-path="url(#table-clip)">"#);
    let _ = write!(
        s,
        r#"<rect width="{total_w}" height="{total_h}" fill="{BG_COLOR}"/>"#
    );
    let _ = write!(
        s,
        r#"<rect width="{total_w}" height="{ROW_HEIGHT}" fill="{HEADER_BG}"/>"#
    );
    let _ = write!(
        s,
        r#"<rect y="{ROW_HEIGHT}" width="{total_w}" height="{HEADER_ACCENT_HEIGHT}" fill="{HEADER_ACCENT}"/>"#
    );

    let data_top = ROW_HEIGHT + HEADER_ACCENT_HEIGHT;
    for i in 0..rows.len() {
        let fill = if i % 2 == 1 { ZEBRA_ODD } else { ZEBRA_EVEN };
        let ry = data_top + i as f32 * ROW_HEIGHT;
        let _ = write!(
            s,
            r#"<rect y="{ry}" width="{total_w}" height="{ROW_HEIGHT}" fill="{fill}"/>"#
        );
    }

    // Column separators (inner edges only)
    let mut x = 0.0;
    for &cw in col_px.iter().take(col_count - 1) {
        x += cw;
        let _ = write!(
            s,
            r#"<line x1="{x}" y1="0" x2="{x}" y2="{total_h}" stroke="{BORDER_COLOR}" stroke-width="0.5" opacity="0.5"/>"#
        );
    }

    // Header text
    write_table_row(&mut s, headers, &col_px, ROW_HEIGHT * 0.62, HEADER_TEXT, "600");

    // Data rows
    for (i, row) in rows.iter().enumerate() {
        let baseline = data_top + i as f32 * ROW_HEIGHT + ROW_HEIGHT * 0.62;
        write_table_row(&mut s, row, &col_px, baseline, TEXT_COLOR, "400");
    }

    let _ = write!(
        s,
        r#"</g><rect width="{total_w}" height="{total_h}" rx="{CORNER_RADIUS}" fill="none" stroke="{BORDER_COLOR}" stroke-width="1"/>"#
    );
    s.push_str("</svg>");

    finish(&s)
}

fn write_table_row(
    s: &mut String,
    cells: &[String],
    col_px: &[f32],
    baseline_y: f32,
    fill: &str,
    weight: &str,
) {
    let mut col_x = 0.0_f32;
    for (i, cell) in cells.iter().enumerate().take(col_px.len()) {
        let tx = col_x + CELL_PAD_X;
        let _ = write!(
            s,
            r#"<text x="{tx}" y="{baseline_y}" font-family="{FONT_FAMILY}" font-size="{FONT_SIZE}" fill="{fill}" font-weight="{weight}">{}</text>"#,
            xml_escape(cell),
        );
        col_x += col_px[i];
    }
}

// ---------------------------------------------------------------------------
// Compass scatter
// ---------------------------------------------------------------------------

/// Render the compass scatter: laps-per-incident against average
/// championship points, one labeled dot per driver.
///
/// The input is the already-filtered plotted set with no infinities.
/// `colors` runs parallel to `points`; a member's configured color tag
/// wins over the default palette.
pub(crate) fn render_compass_png(
    title: &str,
    points: &[CompassPoint],
    colors: &[Option<String>],
) -> Option<Vec<u8>> {
    if points.is_empty() {
        return None;
    }

    let (x_min, x_max) = axis_bounds(points.iter().map(|p| p.laps_per_incident))?;
    let (y_min, y_max) = axis_bounds(points.iter().map(|p| p.avg_champ_points))?;

    let mut s = plot_frame(title, "laps per incident", "avg points", x_min, x_max, y_min, y_max);

    for (i, point) in points.iter().enumerate() {
        let px = x_to_px(point.laps_per_incident, x_min, x_max);
        let py = y_to_px(point.avg_champ_points, y_min, y_max);
        let color = colors
            .get(i)
            .and_then(|c| c.as_deref())
            .unwrap_or(POINT_COLORS[i % POINT_COLORS.len()]);
        let _ = write!(
            s,
            r#"<circle cx="{px}" cy="{py}" r="{POINT_RADIUS}" fill="{color}"/>"#
        );
        let _ = write!(
            s,
            r#"<text x="{lx}" y="{ly}" font-family="{FONT_FAMILY}" font-size="12" fill="{TEXT_COLOR}">{label}</text>"#,
            lx = px + POINT_RADIUS + 3.0,
            ly = py + 4.0,
            label = xml_escape(&point.label),
        );
    }

    s.push_str("</svg>");
    finish(&s)
}

// ---------------------------------------------------------------------------
// Corners-per-incident trend line
// ---------------------------------------------------------------------------

/// Render the rolling corners-per-incident curve for one driver.
///
/// Samples with an infinite ratio (no incidents yet) are dropped; at least
/// two finite samples are needed to draw a line.
pub(crate) fn render_cpi_png(title: &str, samples: &[CpiSample]) -> Option<Vec<u8>> {
    let finite: Vec<&CpiSample> = samples.iter().filter(|s| s.ratio.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }

    let (x_min, x_max) = axis_bounds(finite.iter().map(|s| s.corners as f64))?;
    let (y_min, y_max) = axis_bounds(finite.iter().map(|s| s.ratio))?;

    let mut s = plot_frame(
        title,
        "cumulative corners",
        "corners / incident",
        x_min,
        x_max,
        y_min,
        y_max,
    );

    let mut path = String::new();
    for (i, sample) in finite.iter().enumerate() {
        let px = x_to_px(sample.corners as f64, x_min, x_max);
        let py = y_to_px(sample.ratio, y_min, y_max);
        let _ = write!(path, "{}{px},{py}", if i == 0 { "M" } else { " L" });
    }
    let _ = write!(
        s,
        r#"<path d="{path}" fill="none" stroke="{LINE_COLOR}" stroke-width="2"/>"#
    );
    for sample in &finite {
        let px = x_to_px(sample.corners as f64, x_min, x_max);
        let py = y_to_px(sample.ratio, y_min, y_max);
        let _ = write!(s, r#"<circle cx="{px}" cy="{py}" r="3" fill="{LINE_COLOR}"/>"#);
    }

    s.push_str("</svg>");
    finish(&s)
}

// ---------------------------------------------------------------------------
// Plot plumbing
// ---------------------------------------------------------------------------

/// Padded axis bounds over finite values. `None` when nothing finite is
/// left to plot.
fn axis_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min > max {
        return None;
    }
    // Widen degenerate and flat ranges so a single value still plots.
    let pad = ((max - min) * 0.1).max(1.0);
    Some((min - pad, max + pad))
}

fn x_to_px(v: f64, min: f64, max: f64) -> f32 {
    let frac = ((v - min) / (max - min)) as f32;
    MARGIN_LEFT + frac * (PLOT_W - MARGIN_LEFT - MARGIN_RIGHT)
}

fn y_to_px(v: f64, min: f64, max: f64) -> f32 {
    let frac = ((v - min) / (max - min)) as f32;
    PLOT_H - MARGIN_BOTTOM - frac * (PLOT_H - MARGIN_TOP - MARGIN_BOTTOM)
}

fn format_tick(v: f64, range: f64) -> String {
    if range >= 50.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

/// Shared frame: background, title, grid, ticks and axis labels. The
/// returned string is an open `<svg>` the caller appends marks to.
fn plot_frame(
    title: &str,
    x_label: &str,
    y_label: &str,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
) -> String {
    let mut s = String::with_capacity(4096);
    let _ = write!(
        s,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{pw}" height="{ph}" viewBox="0 0 {PLOT_W} {PLOT_H}">"#,
        pw = (PLOT_W * SCALE).ceil(),
        ph = (PLOT_H * SCALE).ceil(),
    );
    let _ = write!(
        s,
        r#"<rect width="{PLOT_W}" height="{PLOT_H}" rx="{CORNER_RADIUS}" fill="{BG_COLOR}" stroke="{BORDER_COLOR}" stroke-width="1"/>"#
    );
    let _ = write!(
        s,
        r#"<text x="{tx}" y="26" font-family="{FONT_FAMILY}" font-size="16" font-weight="600" fill="{HEADER_TEXT}" text-anchor="middle">{title}</text>"#,
        tx = PLOT_W / 2.0,
        title = xml_escape(title),
    );

    let plot_left = MARGIN_LEFT;
    let plot_right = PLOT_W - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = PLOT_H - MARGIN_BOTTOM;

    for i in 0..=TICKS {
        let frac = i as f64 / TICKS as f64;

        // Vertical grid line + x tick label
        let xv = x_min + frac * (x_max - x_min);
        let px = x_to_px(xv, x_min, x_max);
        let _ = write!(
            s,
            r#"<line x1="{px}" y1="{plot_top}" x2="{px}" y2="{plot_bottom}" stroke="{GRID_COLOR}" stroke-width="0.5" opacity="0.6"/>"#
        );
        let _ = write!(
            s,
            r#"<text x="{px}" y="{ty}" font-family="{FONT_FAMILY}" font-size="11" fill="{TEXT_COLOR}" text-anchor="middle">{label}</text>"#,
            ty = plot_bottom + 16.0,
            label = format_tick(xv, x_max - x_min),
        );

        // Horizontal grid line + y tick label
        let yv = y_min + frac * (y_max - y_min);
        let py = y_to_px(yv, y_min, y_max);
        let _ = write!(
            s,
            r#"<line x1="{plot_left}" y1="{py}" x2="{plot_right}" y2="{py}" stroke="{GRID_COLOR}" stroke-width="0.5" opacity="0.6"/>"#
        );
        let _ = write!(
            s,
            r#"<text x="{tx}" y="{ty}" font-family="{FONT_FAMILY}" font-size="11" fill="{TEXT_COLOR}" text-anchor="end">{label}</text>"#,
            tx = plot_left - 6.0,
            ty = py + 4.0,
            label = format_tick(yv, y_max - y_min),
        );
    }

    let _ = write!(
        s,
        r#"<text x="{tx}" y="{ty}" font-family="{FONT_FAMILY}" font-size="12" fill="{TEXT_COLOR}" text-anchor="middle">{label}</text>"#,
        tx = (plot_left + plot_right) / 2.0,
        ty = PLOT_H - 14.0,
        label = xml_escape(x_label),
    );
    let _ = write!(
        s,
        r#"<text x="16" y="{ty}" font-family="{FONT_FAMILY}" font-size="12" fill="{TEXT_COLOR}" transform="rotate(-90 16 {ty})" text-anchor="middle">{label}</text>"#,
        ty = (plot_top + plot_bottom) / 2.0,
        label = xml_escape(y_label),
    );

    s
}

fn finish(svg: &str) -> Option<Vec<u8>> {
    match rasterize(svg) {
        Ok(png) => Some(png),
        Err(e) => {
            warn!("Chart render failed: {e}");
            None
        }
    }
}

fn rasterize(svg_str: &str) -> Result<Vec<u8>, String> {
    let tree = usvg::Tree::from_data(svg_str.as_bytes(), &SVG_OPTIONS)
        .map_err(|e| format!("SVG parse: {e}"))?;

    let size = tree.size().to_int_size();
    let mut pixmap =
        tiny_skia::Pixmap::new(size.width(), size.height()).ok_or("pixmap allocation failed")?;

    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap.encode_png().map_err(|e| format!("PNG encode: {e}"))
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        vec!["Driver".to_string(), "Points".to_string()]
    }

    #[test]
    fn empty_table_returns_none() {
        assert!(render_table_png(&header(), &[]).is_none());
        assert!(render_table_png(&[], &[vec!["x".to_string()]]).is_none());
    }

    #[test]
    fn simple_table_renders_png() {
        let rows = vec![
            vec!["Alice".to_string(), "120".to_string()],
            vec!["Bob".to_string(), "95".to_string()],
        ];
        let png = render_table_png(&header(), &rows);
        assert!(
            png.is_some(),
            "PNG rendering failed — system fonts may be missing"
        );
        assert_eq!(&png.unwrap()[..4], b"\x89PNG");
    }

    #[test]
    fn empty_compass_returns_none() {
        assert!(render_compass_png("compass", &[], &[]).is_none());
    }

    #[test]
    fn compass_renders_labeled_points() {
        let points = vec![
            CompassPoint {
                label: "Alice".to_string(),
                laps_per_incident: 12.5,
                avg_champ_points: 80.0,
            },
            CompassPoint {
                label: "Bob".to_string(),
                laps_per_incident: 4.0,
                avg_champ_points: 55.0,
            },
        ];
        // Alice has a configured color tag, Bob falls back to the palette.
        let colors = vec![Some("#ff0000".to_string()), None];
        let png = render_compass_png("2024s2 compass", &points, &colors);
        assert!(png.is_some());
        assert_eq!(&png.unwrap()[..4], b"\x89PNG");
    }

    #[test]
    fn single_point_compass_still_renders() {
        let points = vec![CompassPoint {
            label: "Alice".to_string(),
            laps_per_incident: 12.5,
            avg_champ_points: 80.0,
        }];
        assert!(render_compass_png("compass", &points, &[]).is_some());
    }

    #[test]
    fn cpi_needs_two_finite_samples() {
        let samples = vec![CpiSample {
            corners: 500,
            incidents: 0,
            ratio: f64::INFINITY,
        }];
        assert!(render_cpi_png("cpi", &samples).is_none());

        let samples = vec![
            CpiSample {
                corners: 500,
                incidents: 2,
                ratio: 250.0,
            },
            CpiSample {
                corners: 1200,
                incidents: 3,
                ratio: 400.0,
            },
        ];
        assert!(render_cpi_png("cpi", &samples).is_some());
    }

    #[test]
    fn cpi_drops_leading_infinite_samples() {
        let samples = vec![
            CpiSample {
                corners: 400,
                incidents: 0,
                ratio: f64::INFINITY,
            },
            CpiSample {
                corners: 900,
                incidents: 1,
                ratio: 900.0,
            },
            CpiSample {
                corners: 1500,
                incidents: 4,
                ratio: 375.0,
            },
        ];
        assert!(render_cpi_png("cpi", &samples).is_some());
    }

    #[test]
    fn axis_bounds_filters_infinities() {
        let (min, max) = axis_bounds([1.0, f64::INFINITY, 5.0].into_iter()).unwrap();
        assert!(min < 1.0);
        assert!(max > 5.0);
        assert!(max < 10.0);

        assert!(axis_bounds([f64::INFINITY].into_iter()).is_none());
    }

    #[test]
    fn axis_bounds_widens_flat_ranges() {
        let (min, max) = axis_bounds([3.0, 3.0].into_iter()).unwrap();
        assert!(min < 3.0 && max > 3.0);
    }

    #[test]
    fn xml_special_chars_escaped() {
        assert_eq!(xml_escape("a<b>&\"c"), "a&lt;b&gt;&amp;&quot;c");
    }
}
