//! SVG rendering of the coloured module matrix.
//!
//! Layout follows the scanning client's expectations: a rounded black frame
//! with a white plate inset, the module field offset 5 modules from the
//! frame edge (10 modules of total border), and each non-blank module drawn
//! as a rounded square inset 1/16 within its cell.

use std::fmt::Write;

const SCALE: usize = 16;

/// Module value -> fill colour; 0 is blank.
const COLORS: [Option<&str>; 4] = [None, Some("#f00"), Some("#0f0"), Some("#00f")];

/// Path data for a rounded rectangle.
fn rounded(x: f64, y: f64, w: f64, h: f64, r: f64) -> String {
    let mut d = String::new();
    write!(d, "M{} {}", x + r, y).unwrap();
    write!(d, "h{}", w - r - r).unwrap();
    write!(d, "a{r} {r} 0 0 1 {r} {r}").unwrap();
    write!(d, "v{}", h - r - r).unwrap();
    write!(d, "a{r} {r} 0 0 1 -{r} {r}").unwrap();
    write!(d, "h-{}", w - r - r).unwrap();
    write!(d, "a{r} {r} 0 0 1 -{r} -{r}").unwrap();
    write!(d, "v-{}", h - r - r).unwrap();
    write!(d, "a{r} {r} 0 0 1 {r} -{r}").unwrap();
    d.push('Z');
    d
}

/// Render a module sequence as an SVG document. Returns `None` when the
/// sequence is not a non-empty square.
pub fn to_svg(modules: &[u8], background: bool) -> Option<String> {
    let size = (modules.len() as f64).sqrt() as usize;
    if size < 1 || size * size != modules.len() {
        return None;
    }

    let width = size + 10;
    let px = width * SCALE;
    let mut svg = String::new();
    write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{px}\" height=\"{px}\">"
    )
    .unwrap();

    svg.push_str("<defs>");
    for (value, color) in COLORS.iter().enumerate() {
        let Some(color) = color else { continue };
        let inset = 1.0 / 16.0;
        write!(
            svg,
            "<symbol id=\"m{value}\" viewBox=\"0 0 1 1\"><path d=\"{}\" fill=\"{color}\"/></symbol>",
            rounded(inset, inset, 1.0 - 2.0 * inset, 1.0 - 2.0 * inset, 4.0 / 16.0)
        )
        .unwrap();
    }
    svg.push_str("</defs>");

    write!(svg, "<g transform=\"scale({SCALE})\">").unwrap();
    if background {
        write!(
            svg,
            "<rect width=\"{width}\" height=\"{width}\" fill=\"#fff\"/>"
        )
        .unwrap();
    }
    write!(
        svg,
        "<path d=\"{}\" fill=\"#000\"/>",
        rounded(2.0, 2.0, (size + 6) as f64, (size + 6) as f64, 1.0)
    )
    .unwrap();
    write!(
        svg,
        "<path d=\"{}\" fill=\"#fff\"/>",
        rounded(4.0, 4.0, (size + 2) as f64, (size + 2) as f64, 0.5)
    )
    .unwrap();

    for x in 0..size {
        for y in 0..size {
            let value = modules[x * size + y];
            if COLORS[value as usize].is_none() {
                continue;
            }
            write!(
                svg,
                "<use href=\"#m{value}\" x=\"{}\" y=\"{}\" width=\"1\" height=\"1\"/>",
                x + 5,
                y + 5
            )
            .unwrap();
        }
    }

    svg.push_str("</g></svg>");
    Some(svg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
