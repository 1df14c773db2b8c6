//! Module matrices tagged with the role of every module.
//!
//! A [`ModuleMatrix`] is what the renderers consume. It is either produced by the
//! [`crate::qrcode`] encoder or supplied by a caller who computed the symbol elsewhere
//! (for instance a Micro QR code).

use crate::error::{ArtisticError, ArtisticResult};
use crate::qrcode::QrCode;

/// The role of a single module inside a symbol.
///
/// Separators and the quiet zone are always light, the dark module is always dark.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ModuleKind {
    DataDark,
    DataLight,
    FinderDark,
    FinderLight,
    Separator,
    TimingDark,
    TimingLight,
    AlignmentDark,
    AlignmentLight,
    FormatDark,
    FormatLight,
    VersionDark,
    VersionLight,
    DarkModule,
    QuietZone,
}

impl ModuleKind {
    /// Number of distinct module kinds.
    pub const COUNT: usize = 15;

    /// All kinds, in ordinal order.
    pub const ALL: [ModuleKind; ModuleKind::COUNT] = [
        ModuleKind::DataDark,
        ModuleKind::DataLight,
        ModuleKind::FinderDark,
        ModuleKind::FinderLight,
        ModuleKind::Separator,
        ModuleKind::TimingDark,
        ModuleKind::TimingLight,
        ModuleKind::AlignmentDark,
        ModuleKind::AlignmentLight,
        ModuleKind::FormatDark,
        ModuleKind::FormatLight,
        ModuleKind::VersionDark,
        ModuleKind::VersionLight,
        ModuleKind::DarkModule,
        ModuleKind::QuietZone,
    ];

    pub(crate) fn ordinal(self) -> usize {
        self as usize
    }

    /// Returns `true` for modules that are dark in a plain black-on-white rendering.
    pub fn is_dark(self) -> bool {
        use ModuleKind::*;
        matches!(
            self,
            DataDark | FinderDark | TimingDark | AlignmentDark | FormatDark | VersionDark | DarkModule
        )
    }

    /// Returns `true` for the function patterns a decoder locates the symbol with.
    ///
    /// These modules are never covered by background content.
    pub fn is_protected(self) -> bool {
        use ModuleKind::*;
        matches!(
            self,
            FinderDark | FinderLight | Separator | AlignmentDark | AlignmentLight | TimingDark
                | TimingLight
        )
    }

    /// Returns the snake case name used in color tables and configuration files.
    pub fn name(self) -> &'static str {
        use ModuleKind::*;
        match self {
            DataDark => "data_dark",
            DataLight => "data_light",
            FinderDark => "finder_dark",
            FinderLight => "finder_light",
            Separator => "separator",
            TimingDark => "timing_dark",
            TimingLight => "timing_light",
            AlignmentDark => "alignment_dark",
            AlignmentLight => "alignment_light",
            FormatDark => "format_dark",
            FormatLight => "format_light",
            VersionDark => "version_dark",
            VersionLight => "version_light",
            DarkModule => "dark_module",
            QuietZone => "quiet_zone",
        }
    }

    /// Looks up a kind by its [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        ModuleKind::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

/// An immutable grid of [`ModuleKind`]s plus the symbol's quiet zone recommendation.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ModuleMatrix {
    width: u32,
    height: u32,
    kinds: Vec<ModuleKind>,
    default_border: u32,
}

impl ModuleMatrix {
    /// Recommended quiet zone of a QR code, in modules.
    pub const QR_BORDER: u32 = 4;

    /// Recommended quiet zone of a Micro QR code, in modules.
    pub const MICRO_QR_BORDER: u32 = 2;

    /// Builds a matrix from row-major module kinds.
    ///
    /// # Errors
    ///
    /// Returns [`ArtisticError::InvalidParameter`] if the matrix is empty or `kinds` does not
    /// hold exactly `width * height` entries.
    pub fn new(
        width: u32,
        height: u32,
        kinds: Vec<ModuleKind>,
        default_border: u32,
    ) -> ArtisticResult<Self> {
        if width == 0 || height == 0 {
            return Err(ArtisticError::invalid_parameter("module matrix must not be empty"));
        }
        let expected = width as usize * height as usize;
        if kinds.len() != expected {
            return Err(ArtisticError::invalid_parameter(format!(
                "module matrix of {width}x{height} needs {expected} modules, got {}",
                kinds.len()
            )));
        }
        Ok(Self {
            width,
            height,
            kinds,
            default_border,
        })
    }

    /// Builds a matrix from rows of module kinds.
    pub fn from_rows(rows: &[Vec<ModuleKind>], default_border: u32) -> ArtisticResult<Self> {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.len()) as u32;
        if rows.iter().any(|row| row.len() as u32 != width) {
            return Err(ArtisticError::invalid_parameter("module matrix rows differ in length"));
        }
        Self::new(width, height, rows.concat(), default_border)
    }

    /// Width in modules, without quiet zone.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in modules, without quiet zone.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The quiet zone the symbol type recommends (4 for QR, 2 for Micro QR).
    pub fn default_border(&self) -> u32 {
        self.default_border
    }

    /// Returns the kind at `(x, y)`; coordinates outside the matrix are quiet zone.
    pub fn kind(&self, x: i64, y: i64) -> ModuleKind {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return ModuleKind::QuietZone;
        }
        self.kinds[y as usize * self.width as usize + x as usize]
    }

    /// Iterates over the rows of the matrix.
    pub fn rows(&self) -> impl Iterator<Item = &[ModuleKind]> {
        self.kinds.chunks(self.width as usize)
    }

    /// Returns `true` if any module of the matrix has the given kind.
    pub fn contains(&self, kind: ModuleKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Pixel size of the symbol including a quiet zone of `border` modules.
    pub fn symbol_size(&self, scale: u32, border: u32) -> (u32, u32) {
        (
            (self.width + 2 * border) * scale,
            (self.height + 2 * border) * scale,
        )
    }
}

impl From<&QrCode> for ModuleMatrix {
    fn from(qr: &QrCode) -> Self {
        let size = qr.size() as u32;
        let kinds = (0..qr.size())
            .flat_map(|y| (0..qr.size()).map(move |x| (x, y)))
            .map(|(x, y)| qr.module_kind(x, y))
            .collect();
        Self {
            width: size,
            height: size,
            kinds,
            default_border: Self::QR_BORDER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qrcode::QrCodeEcc;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = ModuleMatrix::new(2, 2, vec![ModuleKind::DataDark; 3], 4).unwrap_err();
        assert!(matches!(err, ArtisticError::InvalidParameter(_)));
        assert!(ModuleMatrix::new(0, 0, Vec::new(), 4).is_err());
    }

    #[test]
    fn test_kind_outside_is_quiet_zone() {
        let matrix = ModuleMatrix::new(1, 1, vec![ModuleKind::DataDark], 2).unwrap();
        assert_eq!(matrix.kind(0, 0), ModuleKind::DataDark);
        assert_eq!(matrix.kind(-1, 0), ModuleKind::QuietZone);
        assert_eq!(matrix.kind(0, 1), ModuleKind::QuietZone);
    }

    #[test]
    fn test_symbol_size() {
        let qr = QrCode::encode_text("A", QrCodeEcc::Low).unwrap();
        let matrix = ModuleMatrix::from(&qr);
        assert_eq!(matrix.width(), 21);
        assert_eq!(matrix.symbol_size(1, 4), (29, 29));
        assert_eq!(matrix.symbol_size(3, 0), (63, 63));
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ModuleKind::ALL {
            assert_eq!(ModuleKind::from_name(kind.name()), Some(kind));
            assert_eq!(ModuleKind::ALL[kind.ordinal()], kind);
        }
        assert_eq!(ModuleKind::from_name("logo"), None);
    }

    #[test]
    fn test_protected_set() {
        let protected: Vec<_> = ModuleKind::ALL.iter().filter(|k| k.is_protected()).collect();
        assert_eq!(protected.len(), 7);
        assert!(!ModuleKind::FormatDark.is_protected());
        assert!(!ModuleKind::DarkModule.is_protected());
        assert!(!ModuleKind::DataDark.is_protected());
    }
}
