use crate::paths::is_safe_path_component;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const TOKEN_LOGO: &str = "__logo__";
pub const TOKEN_CPU: &str = "__cpu__";
pub const TOKEN_MEM: &str = "__mem__";

/// Extensions decoded as (possibly) multi-frame containers.
const ANIMATED_EXTENSIONS: &[&str] = &["gif", "webp"];

/// Extensions accepted as individual frames inside a folder sequence.
const FRAME_EXTENSIONS: &[&str] = &["png", "bmp", "jpg", "jpeg", "ico", "webp", "tif", "tiff"];

/// Any image file selectable as a standalone source.
const IMAGE_EXTENSIONS: &[&str] =
    &["gif", "png", "bmp", "jpg", "jpeg", "ico", "webp", "tif", "tiff"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProceduralKind {
    Cpu,
    Memory,
    Logo,
}

/// What an animation identifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationSource {
    Procedural(ProceduralKind),
    SingleImage(PathBuf),
    FolderSequence(PathBuf),
}

impl AnimationSource {
    pub fn is_procedural_gauge(&self) -> bool {
        matches!(
            self,
            AnimationSource::Procedural(ProceduralKind::Cpu)
                | AnimationSource::Procedural(ProceduralKind::Memory)
        )
    }
}

/// Identifier equality is case-insensitive.
pub fn identifiers_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

pub fn procedural_kind_for_token(identifier: &str) -> Option<ProceduralKind> {
    if identifiers_equal(identifier, TOKEN_LOGO) {
        Some(ProceduralKind::Logo)
    } else if identifiers_equal(identifier, TOKEN_CPU) {
        Some(ProceduralKind::Cpu)
    } else if identifiers_equal(identifier, TOKEN_MEM) {
        Some(ProceduralKind::Memory)
    } else {
        None
    }
}

/// Resolve a stored identifier to a source. Pure lookup plus filesystem
/// existence checks; `None` means the caller keeps its previous source.
pub fn resolve(identifier: &str, animations_root: &Path) -> Option<AnimationSource> {
    if identifier.is_empty() {
        return None;
    }

    if let Some(kind) = procedural_kind_for_token(identifier) {
        return Some(AnimationSource::Procedural(kind));
    }

    // Identifiers name direct children of the animations root; reject
    // anything that could traverse out of it.
    if !is_safe_path_component(identifier) {
        return None;
    }

    let path = animations_root.join(identifier);
    if path.is_file() && has_extension(&path, IMAGE_EXTENSIONS) {
        return Some(AnimationSource::SingleImage(path));
    }

    if path.is_dir() && !scan_frame_files(&path).is_empty() {
        return Some(AnimationSource::FolderSequence(path));
    }

    None
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

pub fn is_animated_container(path: &Path) -> bool {
    has_extension(path, ANIMATED_EXTENSIONS)
}

/// Sort key: leading digit run (numeric ascending) when present, otherwise
/// case-insensitive name. Numbered files sort before unnumbered ones.
fn sort_key(file_name: &str) -> (Option<u64>, String) {
    let digits: String = file_name.chars().take_while(|c| c.is_ascii_digit()).collect();
    let numeric = if digits.is_empty() {
        None
    } else {
        digits.parse::<u64>().ok()
    };
    (numeric, file_name.to_lowercase())
}

fn compare_keys(a: &(Option<u64>, String), b: &(Option<u64>, String)) -> Ordering {
    match (a.0, b.0) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.1.cmp(&b.1)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.1.cmp(&b.1),
    }
}

/// Ordered frame files of a folder sequence. This is the single scan used by
/// both the frame decoder and the menu builder, so the order a user sees in
/// the menu is by construction the order frames play in.
pub fn scan_frame_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<((Option<u64>, String), PathBuf)> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| has_extension(entry.path(), FRAME_EXTENSIONS))
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (sort_key(&name), entry.into_path())
        })
        .collect();

    files.sort_by(|a, b| compare_keys(&a.0, &b.0));
    files.into_iter().map(|(_, path)| path).collect()
}

/// Selectable identifiers directly under the animations root: frame folders
/// and single image files, in the same sort order as frames.
pub fn scan_source_entries(animations_root: &Path) -> Vec<String> {
    let mut entries: Vec<((Option<u64>, String), String)> = WalkDir::new(animations_root)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path() != animations_root)
        .filter(|entry| {
            entry.file_type().is_dir()
                || (entry.file_type().is_file() && has_extension(entry.path(), IMAGE_EXTENSIONS))
        })
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (sort_key(&name), name)
        })
        .collect();

    entries.sort_by(|a, b| compare_keys(&a.0, &b.0));
    entries.into_iter().map(|(_, name)| name).collect()
}
