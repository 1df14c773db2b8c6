//! Module colors and the per-kind color table.
//!
//! Every entry of a [`ColorTable`] is a [`ModuleColor`] with three states: inherit the global
//! dark/light color, an explicit color, or transparent.

use std::collections::BTreeMap;
use std::str::FromStr;

use image::Rgba;
use serde::{Deserialize, Deserializer};

use crate::error::{ArtisticError, ArtisticResult};
use crate::matrix::ModuleKind;

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Color of one module kind, or of the global dark/light default.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ModuleColor {
    /// Use the global dark or light color (black/white when those inherit too).
    #[default]
    Inherit,
    /// Do not paint the module.
    Transparent,
    Color(Rgba<u8>),
}

impl ModuleColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        ModuleColor::Color(Rgba([r, g, b, 255]))
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        ModuleColor::Color(Rgba([r, g, b, a]))
    }
}

impl From<Rgba<u8>> for ModuleColor {
    fn from(color: Rgba<u8>) -> Self {
        ModuleColor::Color(color)
    }
}

impl FromStr for ModuleColor {
    type Err = ArtisticError;

    /// Parses `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA` (the `#` is optional), a CSS color
    /// name, `transparent`/`none`, or `inherit`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        match value.as_str() {
            "inherit" | "" => return Ok(ModuleColor::Inherit),
            "transparent" | "none" => return Ok(ModuleColor::Transparent),
            _ => {}
        }
        if let Some(color) = named_color(&value) {
            return Ok(ModuleColor::Color(color));
        }
        parse_hex(value.strip_prefix('#').unwrap_or(&value))
            .map(ModuleColor::Color)
            .ok_or_else(|| ArtisticError::invalid_parameter(format!("unknown color \"{s}\"")))
    }
}

impl<'de> Deserialize<'de> for ModuleColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Channels(Vec<u8>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Channels(v) => match v.as_slice() {
                [r, g, b] => Ok(ModuleColor::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(ModuleColor::rgba(*r, *g, *b, *a)),
                _ => Err(serde::de::Error::custom(
                    "color array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, 255])),
        4 => Some(Rgba([nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?])),
        6 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Some(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => None,
    }
}

/// CSS named colors, sorted by name.
const NAMED_COLORS: [(&str, [u8; 3]); 148] = [
    ("aliceblue", [240, 248, 255]),
    ("antiquewhite", [250, 235, 215]),
    ("aqua", [0, 255, 255]),
    ("aquamarine", [127, 255, 212]),
    ("azure", [240, 255, 255]),
    ("beige", [245, 245, 220]),
    ("bisque", [255, 228, 196]),
    ("black", [0, 0, 0]),
    ("blanchedalmond", [255, 235, 205]),
    ("blue", [0, 0, 255]),
    ("blueviolet", [138, 43, 226]),
    ("brown", [165, 42, 42]),
    ("burlywood", [222, 184, 135]),
    ("cadetblue", [95, 158, 160]),
    ("chartreuse", [127, 255, 0]),
    ("chocolate", [210, 105, 30]),
    ("coral", [255, 127, 80]),
    ("cornflowerblue", [100, 149, 237]),
    ("cornsilk", [255, 248, 220]),
    ("crimson", [220, 20, 60]),
    ("cyan", [0, 255, 255]),
    ("darkblue", [0, 0, 139]),
    ("darkcyan", [0, 139, 139]),
    ("darkgoldenrod", [184, 134, 11]),
    ("darkgray", [169, 169, 169]),
    ("darkgreen", [0, 100, 0]),
    ("darkgrey", [169, 169, 169]),
    ("darkkhaki", [189, 183, 107]),
    ("darkmagenta", [139, 0, 139]),
    ("darkolivegreen", [85, 107, 47]),
    ("darkorange", [255, 140, 0]),
    ("darkorchid", [153, 50, 204]),
    ("darkred", [139, 0, 0]),
    ("darksalmon", [233, 150, 122]),
    ("darkseagreen", [143, 188, 143]),
    ("darkslateblue", [72, 61, 139]),
    ("darkslategray", [47, 79, 79]),
    ("darkslategrey", [47, 79, 79]),
    ("darkturquoise", [0, 206, 209]),
    ("darkviolet", [148, 0, 211]),
    ("deeppink", [255, 20, 147]),
    ("deepskyblue", [0, 191, 255]),
    ("dimgray", [105, 105, 105]),
    ("dimgrey", [105, 105, 105]),
    ("dodgerblue", [30, 144, 255]),
    ("firebrick", [178, 34, 34]),
    ("floralwhite", [255, 250, 240]),
    ("forestgreen", [34, 139, 34]),
    ("fuchsia", [255, 0, 255]),
    ("gainsboro", [220, 220, 220]),
    ("ghostwhite", [248, 248, 255]),
    ("gold", [255, 215, 0]),
    ("goldenrod", [218, 165, 32]),
    ("gray", [128, 128, 128]),
    ("green", [0, 128, 0]),
    ("greenyellow", [173, 255, 47]),
    ("grey", [128, 128, 128]),
    ("honeydew", [240, 255, 240]),
    ("hotpink", [255, 105, 180]),
    ("indianred", [205, 92, 92]),
    ("indigo", [75, 0, 130]),
    ("ivory", [255, 255, 240]),
    ("khaki", [240, 230, 140]),
    ("lavender", [230, 230, 250]),
    ("lavenderblush", [255, 240, 245]),
    ("lawngreen", [124, 252, 0]),
    ("lemonchiffon", [255, 250, 205]),
    ("lightblue", [173, 216, 230]),
    ("lightcoral", [240, 128, 128]),
    ("lightcyan", [224, 255, 255]),
    ("lightgoldenrodyellow", [250, 250, 210]),
    ("lightgray", [211, 211, 211]),
    ("lightgreen", [144, 238, 144]),
    ("lightgrey", [211, 211, 211]),
    ("lightpink", [255, 182, 193]),
    ("lightsalmon", [255, 160, 122]),
    ("lightseagreen", [32, 178, 170]),
    ("lightskyblue", [135, 206, 250]),
    ("lightslategray", [119, 136, 153]),
    ("lightslategrey", [119, 136, 153]),
    ("lightsteelblue", [176, 196, 222]),
    ("lightyellow", [255, 255, 224]),
    ("lime", [0, 255, 0]),
    ("limegreen", [50, 205, 50]),
    ("linen", [250, 240, 230]),
    ("magenta", [255, 0, 255]),
    ("maroon", [128, 0, 0]),
    ("mediumaquamarine", [102, 205, 170]),
    ("mediumblue", [0, 0, 205]),
    ("mediumorchid", [186, 85, 211]),
    ("mediumpurple", [147, 112, 219]),
    ("mediumseagreen", [60, 179, 113]),
    ("mediumslateblue", [123, 104, 238]),
    ("mediumspringgreen", [0, 250, 154]),
    ("mediumturquoise", [72, 209, 204]),
    ("mediumvioletred", [199, 21, 133]),
    ("midnightblue", [25, 25, 112]),
    ("mintcream", [245, 255, 250]),
    ("mistyrose", [255, 228, 225]),
    ("moccasin", [255, 228, 181]),
    ("navajowhite", [255, 222, 173]),
    ("navy", [0, 0, 128]),
    ("oldlace", [253, 245, 230]),
    ("olive", [128, 128, 0]),
    ("olivedrab", [107, 142, 35]),
    ("orange", [255, 165, 0]),
    ("orangered", [255, 69, 0]),
    ("orchid", [218, 112, 214]),
    ("palegoldenrod", [238, 232, 170]),
    ("palegreen", [152, 251, 152]),
    ("paleturquoise", [175, 238, 238]),
    ("palevioletred", [219, 112, 147]),
    ("papayawhip", [255, 239, 213]),
    ("peachpuff", [255, 218, 185]),
    ("peru", [205, 133, 63]),
    ("pink", [255, 192, 203]),
    ("plum", [221, 160, 221]),
    ("powderblue", [176, 224, 230]),
    ("purple", [128, 0, 128]),
    ("rebeccapurple", [102, 51, 153]),
    ("red", [255, 0, 0]),
    ("rosybrown", [188, 143, 143]),
    ("royalblue", [65, 105, 225]),
    ("saddlebrown", [139, 69, 19]),
    ("salmon", [250, 128, 114]),
    ("sandybrown", [244, 164, 96]),
    ("seagreen", [46, 139, 87]),
    ("seashell", [255, 245, 238]),
    ("sienna", [160, 82, 45]),
    ("silver", [192, 192, 192]),
    ("skyblue", [135, 206, 235]),
    ("slateblue", [106, 90, 205]),
    ("slategray", [112, 128, 144]),
    ("slategrey", [112, 128, 144]),
    ("snow", [255, 250, 250]),
    ("springgreen", [0, 255, 127]),
    ("steelblue", [70, 130, 180]),
    ("tan", [210, 180, 140]),
    ("teal", [0, 128, 128]),
    ("thistle", [216, 191, 216]),
    ("tomato", [255, 99, 71]),
    ("turquoise", [64, 224, 208]),
    ("violet", [238, 130, 238]),
    ("wheat", [245, 222, 179]),
    ("white", [255, 255, 255]),
    ("whitesmoke", [245, 245, 245]),
    ("yellow", [255, 255, 0]),
    ("yellowgreen", [154, 205, 50]),
];

fn named_color(name: &str) -> Option<Rgba<u8>> {
    let index = NAMED_COLORS.binary_search_by(|(n, _)| (*n).cmp(name)).ok()?;
    let [r, g, b] = NAMED_COLORS[index].1;
    Some(Rgba([r, g, b, 255]))
}

/// Colors of all module kinds.
///
/// Resolution order per module: the kind's own entry, then the global dark or light color
/// (chosen by [`ModuleKind::is_dark`]), then black or white.
///
/// ```rust
/// use qirust_artistic::color::{ColorTable, ModuleColor};
/// use qirust_artistic::matrix::ModuleKind;
///
/// let colors = ColorTable::new()
///     .dark(ModuleColor::rgb(0, 0, 128))
///     .with(ModuleKind::FinderDark, ModuleColor::rgb(255, 0, 0));
/// assert_eq!(colors.resolve(ModuleKind::DataDark), Some(image::Rgba([0, 0, 128, 255])));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct ColorTable {
    dark: ModuleColor,
    light: ModuleColor,
    kinds: [ModuleColor; ModuleKind::COUNT],
}

impl ColorTable {
    /// A table where every kind inherits: black on white.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dark(mut self, color: ModuleColor) -> Self {
        self.dark = color;
        self
    }

    pub fn light(mut self, color: ModuleColor) -> Self {
        self.light = color;
        self
    }

    pub fn with(mut self, kind: ModuleKind, color: ModuleColor) -> Self {
        self.set(kind, color);
        self
    }

    pub fn set(&mut self, kind: ModuleKind, color: ModuleColor) {
        self.kinds[kind.ordinal()] = color;
    }

    pub fn get(&self, kind: ModuleKind) -> ModuleColor {
        self.kinds[kind.ordinal()]
    }

    /// Resolves the color of `kind`; `None` means transparent.
    pub fn resolve(&self, kind: ModuleKind) -> Option<Rgba<u8>> {
        let global = if kind.is_dark() { self.dark } else { self.light };
        let fallback = if kind.is_dark() { BLACK } else { WHITE };
        let entry = match self.get(kind) {
            ModuleColor::Inherit => global,
            explicit => explicit,
        };
        match entry {
            ModuleColor::Inherit => Some(fallback),
            ModuleColor::Transparent => None,
            ModuleColor::Color(color) => Some(color),
        }
    }

    /// The pixel written for transparent modules: the inverse of the dark color with alpha 0.
    pub fn transparent_fill(&self) -> Rgba<u8> {
        let dark = match self.dark {
            ModuleColor::Color(color) => color,
            _ => BLACK,
        };
        Rgba([255 - dark[0], 255 - dark[1], 255 - dark[2], 0])
    }

    /// Resolves `kind` to a concrete pixel value.
    pub fn pixel(&self, kind: ModuleKind) -> Rgba<u8> {
        self.resolve(kind).unwrap_or_else(|| self.transparent_fill())
    }

    /// Reads a table from JSON, e.g. `{"dark": "#036", "light": null, "finder_dark": "red"}`.
    ///
    /// `null` marks a transparent entry.
    pub fn from_json(json: &str) -> ArtisticResult<Self> {
        serde_json::from_str(json)
            .map_err(|err| ArtisticError::invalid_parameter(format!("color table: {err}")))
    }
}

impl<'de> Deserialize<'de> for ColorTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<String, Option<ModuleColor>>::deserialize(deserializer)?;
        let mut table = ColorTable::new();
        for (name, color) in entries {
            let color = color.unwrap_or(ModuleColor::Transparent);
            match name.as_str() {
                "dark" => table.dark = color,
                "light" => table.light = color,
                other => match ModuleKind::from_name(other) {
                    Some(kind) => table.set(kind, color),
                    None => {
                        return Err(serde::de::Error::custom(format!(
                            "unknown module kind \"{other}\""
                        )))
                    }
                },
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_forms() {
        assert_eq!("#000".parse::<ModuleColor>().unwrap(), ModuleColor::rgb(0, 0, 0));
        assert_eq!("#00fc".parse::<ModuleColor>().unwrap(), ModuleColor::rgba(0, 0, 255, 204));
        assert_eq!("FF8000".parse::<ModuleColor>().unwrap(), ModuleColor::rgb(255, 128, 0));
        assert_eq!(
            "#11223344".parse::<ModuleColor>().unwrap(),
            ModuleColor::rgba(0x11, 0x22, 0x33, 0x44)
        );
        assert!("#12345".parse::<ModuleColor>().is_err());
        assert!("#ggg".parse::<ModuleColor>().is_err());
    }

    #[test]
    fn parse_names_and_states() {
        assert_eq!("Green".parse::<ModuleColor>().unwrap(), ModuleColor::rgb(0, 128, 0));
        assert_eq!("none".parse::<ModuleColor>().unwrap(), ModuleColor::Transparent);
        assert_eq!("inherit".parse::<ModuleColor>().unwrap(), ModuleColor::Inherit);
        assert!("chartreuse-ish".parse::<ModuleColor>().is_err());
    }

    #[test]
    fn parse_css_color_names() {
        assert_eq!("rebeccapurple".parse::<ModuleColor>().unwrap(), ModuleColor::rgb(102, 51, 153));
        assert_eq!(
            "LightGoldenrodYellow".parse::<ModuleColor>().unwrap(),
            ModuleColor::rgb(250, 250, 210)
        );
        assert_eq!("slategrey".parse::<ModuleColor>().unwrap(), "slategray".parse().unwrap());
        assert_eq!("aliceblue".parse::<ModuleColor>().unwrap(), ModuleColor::rgb(240, 248, 255));
        assert_eq!("yellowgreen".parse::<ModuleColor>().unwrap(), ModuleColor::rgb(154, 205, 50));
        assert_eq!(NAMED_COLORS.len(), 148);
        assert!(NAMED_COLORS.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn resolution_order() {
        let table = ColorTable::new()
            .dark(ModuleColor::rgb(1, 2, 3))
            .with(ModuleKind::FinderDark, ModuleColor::rgb(9, 9, 9))
            .with(ModuleKind::QuietZone, ModuleColor::Transparent);
        assert_eq!(table.resolve(ModuleKind::FinderDark), Some(Rgba([9, 9, 9, 255])));
        assert_eq!(table.resolve(ModuleKind::DataDark), Some(Rgba([1, 2, 3, 255])));
        assert_eq!(table.resolve(ModuleKind::Separator), Some(WHITE));
        assert_eq!(table.resolve(ModuleKind::QuietZone), None);
        assert_eq!(table.pixel(ModuleKind::QuietZone), Rgba([254, 253, 252, 0]));
    }

    #[test]
    fn transparent_light_inherits_to_light_kinds() {
        let table = ColorTable::new().light(ModuleColor::Transparent);
        assert_eq!(table.resolve(ModuleKind::DataLight), None);
        assert_eq!(table.resolve(ModuleKind::TimingLight), None);
        assert_eq!(table.resolve(ModuleKind::DataDark), Some(BLACK));
        assert_eq!(table.transparent_fill(), Rgba([255, 255, 255, 0]));
    }

    #[test]
    fn deserialize_from_json() {
        let table = ColorTable::from_json(
            r##"{"dark": "#036", "light": null, "finder_dark": [255, 0, 0], "data_light": "yellow"}"##,
        )
        .unwrap();
        assert_eq!(table.resolve(ModuleKind::DataDark), Some(Rgba([0, 0x33, 0x66, 255])));
        assert_eq!(table.resolve(ModuleKind::FinderDark), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(table.resolve(ModuleKind::DataLight), Some(Rgba([255, 255, 0, 255])));
        assert_eq!(table.resolve(ModuleKind::Separator), None);

        let err = ColorTable::from_json(r#"{"logo": "red"}"#).unwrap_err();
        assert!(err.to_string().contains("logo"));
    }
}
