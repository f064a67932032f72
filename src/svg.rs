//! SVG text assembly: coordinate formatting, path data rendering and the
//! document/symbol templates.

use crate::curve::{Curve, SegmentTag};

/// Format a coordinate with up to three decimals, dropping an all-zero
/// fraction: `2.0` renders as `2`, `2.5` as `2.500`.
pub fn fixed(value: f64) -> String {
    let formatted = format!("{value:.3}");
    match formatted.strip_suffix(".000") {
        Some(stripped) => stripped.to_string(),
        None => formatted,
    }
}

/// Render one closed curve as SVG path data. The path opens at the last
/// segment's endpoint, which is where the first segment begins.
pub fn render_curve(curve: &Curve, scale: (f64, f64)) -> String {
    let (sx, sy) = scale;
    let m = curve.len();
    let start = curve.endpoint(m - 1);

    let mut path = format!("M {} {}", fixed(start.x * sx), fixed(start.y * sy));

    for i in 0..m {
        match curve.tag[i] {
            SegmentTag::Curve => {
                let c0 = curve.c[3 * i];
                let c1 = curve.c[3 * i + 1];
                let c2 = curve.c[3 * i + 2];
                path.push_str(&format!(
                    " C {} {}, {} {}, {} {}",
                    fixed(c0.x * sx),
                    fixed(c0.y * sy),
                    fixed(c1.x * sx),
                    fixed(c1.y * sy),
                    fixed(c2.x * sx),
                    fixed(c2.y * sy),
                ));
            }
            SegmentTag::Corner => {
                let c1 = curve.c[3 * i + 1];
                let c2 = curve.c[3 * i + 2];
                path.push_str(&format!(
                    " L {} {} {} {}",
                    fixed(c1.x * sx),
                    fixed(c1.y * sy),
                    fixed(c2.x * sx),
                    fixed(c2.y * sy),
                ));
            }
        }
    }

    path
}

/// One `<path>` element for a set of curves. `fill: None` omits the fill
/// attribute entirely (symbol form).
pub fn path_tag(curves: &[Curve], scale: (f64, f64), fill: Option<&str>) -> String {
    let d = curves
        .iter()
        .map(|curve| render_curve(curve, scale))
        .collect::<Vec<_>>()
        .join(" ");

    match fill {
        Some(fill) => {
            format!(r#"<path d="{d}" stroke="none" fill="{fill}" fill-rule="evenodd"/>"#)
        }
        None => format!(r#"<path d="{d}" stroke="none" fill-rule="evenodd"/>"#),
    }
}

/// Full SVG document around the given elements. A background rect is
/// emitted unless `background` is `None`.
pub fn document(width: u32, height: u32, background: Option<&str>, elements: &[String]) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" version="1.1">"#
    );

    if let Some(background) = background {
        svg.push_str("\n\t");
        svg.push_str(&format!(
            r#"<rect x="0" y="0" width="100%" height="100%" fill="{background}"/>"#
        ));
    }

    for element in elements {
        svg.push_str("\n\t");
        svg.push_str(element);
    }

    svg.push_str("\n</svg>");
    svg
}

/// `<symbol>` wrapper: viewBox only, no background, no fill.
pub fn symbol(id: &str, width: u32, height: u32, content: &str) -> String {
    format!(r#"<symbol viewBox="0 0 {width} {height}" id="{id}">{content}</symbol>"#)
}

/// Set an attribute on the first tag of an HTML/SVG fragment: replaces an
/// existing value or inserts the attribute right after the tag name.
pub fn set_attribute(tag: &str, name: &str, value: &str) -> String {
    let needle = format!(" {name}=\"");

    if let Some(position) = tag.find(&needle) {
        let value_start = position + needle.len();
        let value_len = tag[value_start..].find('"').unwrap_or(0);
        format!(
            "{}{}{}",
            &tag[..value_start],
            value,
            &tag[value_start + value_len..]
        )
    } else {
        let name_end = tag
            .find([' ', '>', '/'])
            .unwrap_or(tag.len());
        format!(
            "{} {}=\"{}\"{}",
            &tag[..name_end],
            name,
            value,
            &tag[name_end..]
        )
    }
}
