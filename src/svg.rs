//! SVG output of module matrices.

use image::Rgba;

use crate::color::ColorTable;
use crate::error::ArtisticResult;
use crate::matrix::ModuleMatrix;
use crate::raster::validate_scale;

/// Returns SVG code depicting `matrix` with the given colors.
///
/// The drawing uses one path per distinct color and omits transparent modules. Its `width` and
/// `height` match `matrix.symbol_size(scale, border)`. The string always uses Unix newlines.
pub fn to_svg_string(
    matrix: &ModuleMatrix,
    scale: u32,
    border: Option<u32>,
    colors: &ColorTable,
) -> ArtisticResult<String> {
    let scale = validate_scale(scale)?;
    let border = border.unwrap_or(matrix.default_border());
    let (width, height) = matrix.symbol_size(scale, border);
    let (modules_x, modules_y) = matrix.symbol_size(1, border);

    let mut paths: Vec<(Rgba<u8>, String)> = Vec::new();
    for y in 0..modules_y {
        for x in 0..modules_x {
            let kind = matrix.kind(
                i64::from(x) - i64::from(border),
                i64::from(y) - i64::from(border),
            );
            let color = match colors.resolve(kind) {
                Some(color) if color[3] != 0 => color,
                _ => continue,
            };
            let index = match paths.iter().position(|(c, _)| *c == color) {
                Some(index) => index,
                None => {
                    paths.push((color, String::new()));
                    paths.len() - 1
                }
            };
            let d = &mut paths[index].1;
            if !d.is_empty() {
                d.push(' ');
            }
            d.push_str(&format!("M{x},{y}h1v1h-1z"));
        }
    }

    let mut result = String::new();
    result += "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
    result += &format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {modules_x} {modules_y}\" stroke=\"none\">\n"
    );
    for (color, d) in &paths {
        let [r, g, b, a] = color.0;
        result += &format!("\t<path d=\"{d}\" fill=\"#{r:02x}{g:02x}{b:02x}\"");
        if a != 255 {
            result += &format!(" fill-opacity=\"{:.3}\"", f64::from(a) / 255.0);
        }
        result += "/>\n";
    }
    result += "</svg>\n";
    Ok(result)
}
