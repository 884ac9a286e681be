//! Font lookup, text measurement and glyph outlines for text overlays.
//!
//! The font book is built once per process: the first caller scans the system
//! font directories (plus any configured extras) and later lookups reuse the
//! index. Faces are parsed lazily the first time a name resolves to them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use ab_glyph::{Font, FontVec, GlyphId, OutlineCurve, PxScale, PxScaleFont, ScaleFont};
use tiny_skia::PathBuilder;

use crate::geometry::{Point, Size};

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];
const MAX_SCAN_DEPTH: usize = 6;
const PREFERRED_FALLBACKS: &[&str] = &[
    "dejavusans",
    "notosansregular",
    "liberationsansregular",
    "freesans",
    "cantarellregular",
    "arial",
];
/// Advance and line height used when no face is available at all.
const FALLBACK_ADVANCE_EM: f64 = 0.6;
const FALLBACK_LINE_HEIGHT_EM: f64 = 1.2;

static FONT_BOOK: OnceLock<FontBook> = OnceLock::new();

/// Installs the process-wide font book with `extra_dirs` scanned in addition to
/// the system directories and `default_font` tried first as the fallback face.
/// Returns `false` when the book already exists.
pub fn init_font_book(extra_dirs: &[PathBuf], default_font: &str) -> bool {
    let mut initialized = false;
    FONT_BOOK.get_or_init(|| {
        initialized = true;
        let mut dirs = system_font_dirs();
        dirs.extend(extra_dirs.iter().cloned());
        FontBook::scan(&dirs, Some(default_font))
    });
    initialized
}

pub fn font_book() -> &'static FontBook {
    FONT_BOOK.get_or_init(|| FontBook::scan(&system_font_dirs(), None))
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
    ];
    if let Some(data_home) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        dirs.push(data_home.join("fonts"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join(".fonts"));
    }
    dirs
}

/// Lowercase with spaces, hyphens and underscores removed, so "DejaVu Sans",
/// "dejavu-sans" and the file stem "DejaVuSans" share one key.
fn normalize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

pub struct FontBook {
    index: HashMap<String, PathBuf>,
    fallback_key: Option<String>,
    faces: Mutex<HashMap<String, Option<Arc<FontVec>>>>,
}

impl FontBook {
    /// Indexes every font file under `dirs`. `fallback` is tried first as the
    /// substitute face for unknown names.
    pub fn scan(dirs: &[PathBuf], fallback: Option<&str>) -> Self {
        let mut index = HashMap::new();
        for dir in dirs {
            collect_font_files(dir, 0, &mut index);
        }
        let configured = fallback.map(normalize_font_name);
        let fallback_key = configured
            .iter()
            .flat_map(|name| [name.clone(), format!("{name}regular")])
            .chain(PREFERRED_FALLBACKS.iter().map(|key| key.to_string()))
            .find(|key| index.contains_key(key))
            .or_else(|| index.keys().min().cloned());
        tracing::debug!(fonts = index.len(), fallback = ?fallback_key, "font book indexed");
        Self {
            index,
            fallback_key,
            faces: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Index key `name` resolves to: exact match, then the "regular" style of
    /// the family.
    fn resolve_key(&self, name: &str) -> Option<&str> {
        let wanted = normalize_font_name(name);
        if wanted.is_empty() {
            return None;
        }
        if let Some((key, _)) = self.index.get_key_value(&wanted) {
            return Some(key.as_str());
        }
        self.index
            .get_key_value(&format!("{wanted}regular"))
            .map(|(key, _)| key.as_str())
    }

    pub fn has_font(&self, name: &str) -> bool {
        self.resolve_key(name).is_some()
    }

    /// Face for `name`, or the fallback face when the name is unknown or fails
    /// to parse.
    pub fn face(&self, name: &str) -> Option<Arc<FontVec>> {
        if let Some(key) = self.resolve_key(name) {
            if let Some(face) = self.load(key) {
                return Some(face);
            }
        }
        let fallback = self.fallback_key.as_deref()?;
        self.load(fallback)
    }

    fn load(&self, key: &str) -> Option<Arc<FontVec>> {
        let mut faces = match self.faces.lock() {
            Ok(faces) => faces,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(cached) = faces.get(key) {
            return cached.clone();
        }
        let path = self.index.get(key)?;
        let face = match fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec_and_index(bytes, 0) {
                Ok(face) => Some(Arc::new(face)),
                Err(err) => {
                    tracing::warn!(?err, ?path, "failed to parse font; skipping");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(?err, ?path, "failed to read font file; skipping");
                None
            }
        };
        faces.insert(key.to_string(), face.clone());
        face
    }

    /// Extent of `text` at `size`. Never fails: with no usable face the size
    /// is estimated from the character count.
    pub fn measure(&self, text: &str, font_name: &str, size: f64) -> Size {
        let lines: Vec<&str> = text.split('\n').collect();
        let Some(face) = self.face(font_name) else {
            let widest = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
            return Size::new(
                widest as f64 * size * FALLBACK_ADVANCE_EM,
                lines.len() as f64 * size * FALLBACK_LINE_HEIGHT_EM,
            );
        };
        let scaled = face.as_scaled(PxScale::from(size as f32));
        let line_height = f64::from(scaled.height() + scaled.line_gap());
        let widest = lines
            .iter()
            .map(|line| line_advance(&scaled, line))
            .fold(0.0_f64, f64::max);
        Size::new(widest, lines.len() as f64 * line_height)
    }

    /// Glyph outlines of `text` with the first line's top-left at `origin`.
    /// `None` when there is no usable face or nothing visible to draw.
    pub fn text_path(
        &self,
        text: &str,
        font_name: &str,
        size: f64,
        origin: Point,
    ) -> Option<tiny_skia::Path> {
        let face = self.face(font_name)?;
        let scaled = face.as_scaled(PxScale::from(size as f32));
        let h_factor = scaled.h_scale_factor();
        let v_factor = scaled.v_scale_factor();
        let line_height = scaled.height() + scaled.line_gap();

        let mut builder = PathBuilder::new();
        for (row, line) in text.split('\n').enumerate() {
            let baseline = origin.y as f32 + scaled.ascent() + row as f32 * line_height;
            let mut caret = origin.x as f32;
            let mut previous: Option<GlyphId> = None;
            for ch in line.chars() {
                let glyph_id = scaled.glyph_id(ch);
                if let Some(previous) = previous {
                    caret += scaled.kern(previous, glyph_id);
                }
                if let Some(outline) = face.outline(glyph_id) {
                    let map = |point: ab_glyph::Point| {
                        (caret + point.x * h_factor, baseline - point.y * v_factor)
                    };
                    append_outline(&mut builder, &outline.curves, map);
                }
                caret += scaled.h_advance(glyph_id);
                previous = Some(glyph_id);
            }
        }
        builder.finish()
    }
}

fn line_advance(scaled: &PxScaleFont<&FontVec>, line: &str) -> f64 {
    let mut width = 0.0_f32;
    let mut previous: Option<GlyphId> = None;
    for ch in line.chars() {
        let glyph_id = scaled.glyph_id(ch);
        if let Some(previous) = previous {
            width += scaled.kern(previous, glyph_id);
        }
        width += scaled.h_advance(glyph_id);
        previous = Some(glyph_id);
    }
    f64::from(width)
}

fn append_outline(
    builder: &mut PathBuilder,
    curves: &[OutlineCurve],
    map: impl Fn(ab_glyph::Point) -> (f32, f32),
) {
    let mut cursor: Option<ab_glyph::Point> = None;
    for curve in curves {
        let start = match curve {
            OutlineCurve::Line(p0, _)
            | OutlineCurve::Quad(p0, _, _)
            | OutlineCurve::Cubic(p0, _, _, _) => *p0,
        };
        if cursor != Some(start) {
            if cursor.is_some() {
                builder.close();
            }
            let (x, y) = map(start);
            builder.move_to(x, y);
        }
        let end = match *curve {
            OutlineCurve::Line(_, p1) => {
                let (x, y) = map(p1);
                builder.line_to(x, y);
                p1
            }
            OutlineCurve::Quad(_, p1, p2) => {
                let (x1, y1) = map(p1);
                let (x, y) = map(p2);
                builder.quad_to(x1, y1, x, y);
                p2
            }
            OutlineCurve::Cubic(_, p1, p2, p3) => {
                let (x1, y1) = map(p1);
                let (x2, y2) = map(p2);
                let (x, y) = map(p3);
                builder.cubic_to(x1, y1, x2, y2, x, y);
                p3
            }
        };
        cursor = Some(end);
    }
    if cursor.is_some() {
        builder.close();
    }
}

fn collect_font_files(dir: &Path, depth: usize, index: &mut HashMap<String, PathBuf>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_font_files(&path, depth + 1, index);
            continue;
        }
        let is_font = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if !is_font {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            index.entry(normalize_font_name(stem)).or_insert(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_with_files(names: &[&str]) -> (tempfile::TempDir, FontBook) {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("truetype/family");
        fs::create_dir_all(&nested).expect("nested font dir");
        for name in names {
            fs::write(nested.join(name), b"not a real font").expect("font stub");
        }
        let book = FontBook::scan(&[dir.path().to_path_buf()], None);
        (dir, book)
    }

    #[test]
    fn normalize_font_name_ignores_case_and_separators() {
        assert_eq!(normalize_font_name("DejaVu Sans"), "dejavusans");
        assert_eq!(normalize_font_name("Noto_Sans-Regular"), "notosansregular");
    }

    #[test]
    fn scan_indexes_font_files_recursively_by_stem() {
        let (_dir, book) = book_with_files(&["DejaVuSans.ttf", "NotoSans-Regular.otf", "readme.txt"]);
        assert_eq!(book.len(), 2);
        assert!(book.has_font("DejaVu Sans"));
        assert!(book.has_font("noto sans"));
        assert!(!book.has_font("Comic Sans"));
    }

    #[test]
    fn resolve_prefers_exact_then_regular_style() {
        let (_dir, book) = book_with_files(&[
            "Inter-Bold.ttf",
            "Inter-Regular.ttf",
            "Mono.ttf",
            "MonoCondensed.ttf",
        ]);
        assert_eq!(book.resolve_key("Inter"), Some("interregular"));
        assert_eq!(book.resolve_key("Inter Bold"), Some("interbold"));
        assert_eq!(book.resolve_key("mono"), Some("mono"));
        assert_eq!(book.resolve_key("Mon"), None);
    }

    #[test]
    fn unparsable_faces_fall_back_to_heuristic_measurement() {
        let (_dir, book) = book_with_files(&["Broken.ttf"]);
        assert!(book.face("Broken").is_none());
        let size = book.measure("abcd\nxy", "Broken", 10.0);
        assert!((size.width - 24.0).abs() < 1e-9);
        assert!((size.height - 24.0).abs() < 1e-9);
        assert!(book.text_path("abcd", "Broken", 10.0, Point::ZERO).is_none());
    }

    #[test]
    fn configured_fallback_wins_over_builtin_preferences() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["DejaVuSans.ttf", "Inter-Regular.ttf"] {
            fs::write(dir.path().join(name), b"stub").expect("font stub");
        }
        let book = FontBook::scan(&[dir.path().to_path_buf()], Some("Inter"));
        assert_eq!(book.fallback_key.as_deref(), Some("interregular"));
        let book = FontBook::scan(&[dir.path().to_path_buf()], None);
        assert_eq!(book.fallback_key.as_deref(), Some("dejavusans"));
    }

    #[test]
    fn empty_book_measures_without_panicking() {
        let book = FontBook::scan(&[], None);
        assert!(book.is_empty());
        let size = book.measure("", "Sans", 24.0);
        assert_eq!(size.width, 0.0);
        assert!(size.height > 0.0);
    }
}
