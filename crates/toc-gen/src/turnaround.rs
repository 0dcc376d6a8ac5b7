//! Character reference turnaround views and reference-path classification
//!
//! Reference images live under `assets/characters/` and `assets/objects/`.
//! A character reference can be rendered as front/side/back views plus a
//! horizontal strip of all three for video conditioning.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use toc_core::TocError;
use toc_manifest::{inject_lines, PromptSection};

pub const DEFAULT_STRIP_SUFFIX: &str = "_refstrip";

const FULL_BODY_LINE: &str = "全身（頭からつま先まで）を入れる。足先が切れない（クロップしない）。";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum View {
    Front,
    Side,
    Back,
}

impl View {
    pub const ALL: [View; 3] = [View::Front, View::Side, View::Back];

    pub fn as_str(self) -> &'static str {
        match self {
            View::Front => "front",
            View::Side => "side",
            View::Back => "back",
        }
    }

    /// Instructions injected under the SCENE heading of the prompt
    fn prompt_lines(self) -> [&'static str; 3] {
        match self {
            View::Front => [
                "キャラクター参照画像: 正面（FRONT）ビュー。",
                FULL_BODY_LINE,
                "ニュートラルな姿勢。腕は自然に下ろす。中央構図。背景はクリーンで無地。",
            ],
            View::Side => [
                "キャラクター参照画像: 左側面（LEFT SIDE）ビュー。",
                FULL_BODY_LINE,
                "ニュートラルな姿勢。中央構図。背景はクリーンで無地。",
            ],
            View::Back => [
                "キャラクター参照画像: 背面（BACK）ビュー。",
                FULL_BODY_LINE,
                "ニュートラルな姿勢。中央構図。背景はクリーンで無地。",
            ],
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = TocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "front" => Ok(View::Front),
            "side" => Ok(View::Side),
            "back" => Ok(View::Back),
            other => Err(TocError::Config(format!(
                "Unknown character reference view '{}'. Allowed: front,side,back",
                other
            ))),
        }
    }
}

/// Parse a comma-separated view list; blank items are ignored
pub fn parse_views(csv: &str) -> toc_core::Result<Vec<View>> {
    let mut views = Vec::new();
    for part in csv.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let view: View = part.parse()?;
        if !views.contains(&view) {
            views.push(view);
        }
    }
    views.sort();
    Ok(views)
}

/// Views to render: front always, then side/back when requested
pub fn views_to_generate(requested: &[View]) -> Vec<View> {
    View::ALL
        .into_iter()
        .filter(|v| *v == View::Front || requested.contains(v))
        .collect()
}

fn parent_names(path: &Path) -> (Option<String>, Option<String>) {
    let parent = path.parent();
    let name = |p: Option<&Path>| {
        p.and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string())
    };
    (name(parent), name(parent.and_then(Path::parent)))
}

/// True for `.../assets/characters/<file>`
pub fn is_character_ref_path(path: &Path) -> bool {
    let (dir, grand) = parent_names(path);
    dir.as_deref() == Some("characters") && grand.as_deref() == Some("assets")
}

/// True for `.../assets/objects/<file>`
pub fn is_object_ref_path(path: &Path) -> bool {
    let (dir, grand) = parent_names(path);
    dir.as_deref() == Some("objects") && grand.as_deref() == Some("assets")
}

fn stem_and_ext(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| ".png".to_string());
    (stem, ext)
}

/// Sibling file for a view: `hero.png` and `hero_front.png` both give `hero_side.png`
pub fn view_path(front: &Path, view: View) -> PathBuf {
    if view == View::Front {
        return front.to_path_buf();
    }
    let (stem, ext) = stem_and_ext(front);
    if let Some(root) = stem.strip_suffix("_front") {
        return front.with_file_name(format!("{}_{}{}", root, view, ext));
    }
    if stem.ends_with(&format!("_{}", view)) {
        return front.to_path_buf();
    }
    front.with_file_name(format!("{}_{}{}", stem, view, ext))
}

/// Strip image next to a view: `hero_front.png` gives `hero_refstrip.png`
pub fn strip_path(front: &Path, suffix: &str) -> PathBuf {
    let (stem, ext) = stem_and_ext(front);
    let root = ["_front", "_side", "_back"]
        .iter()
        .find_map(|v| stem.strip_suffix(v))
        .unwrap_or(&stem);
    front.with_file_name(format!("{}{}{}", root, suffix, ext))
}

/// True for a character reference whose stem ends with the strip suffix
pub fn is_strip_path(path: &Path, suffix: &str) -> bool {
    let suffix = suffix.trim();
    if suffix.is_empty() || !is_character_ref_path(path) {
        return false;
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

/// Prompt for one turnaround view
pub fn view_prompt(base_prompt: &str, view: View) -> String {
    let lines: Vec<String> = view.prompt_lines().iter().map(|l| l.to_string()).collect();
    inject_lines(base_prompt, PromptSection::Scene, &lines)
}

/// Keep only strips among character references when any strip is present
pub fn prefer_strips(refs: Vec<PathBuf>, suffix: &str) -> Vec<PathBuf> {
    if !refs.iter().any(|p| is_strip_path(p, suffix)) {
        return refs;
    }
    refs.into_iter()
        .filter(|p| !is_character_ref_path(p) || is_strip_path(p, suffix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_reference_paths() {
        assert!(is_character_ref_path(Path::new("assets/characters/hero.png")));
        assert!(is_character_ref_path(Path::new("/work/ep1/assets/characters/hero.png")));
        assert!(!is_character_ref_path(Path::new("characters/hero.png")));
        assert!(!is_character_ref_path(Path::new("assets/scenes/hero.png")));
        assert!(is_object_ref_path(Path::new("ep/assets/objects/gate.png")));
        assert!(!is_object_ref_path(Path::new("ep/assets/characters/gate.png")));
    }

    #[test]
    fn test_view_paths() {
        let plain = Path::new("assets/characters/hero.png");
        assert_eq!(view_path(plain, View::Front), plain);
        assert_eq!(view_path(plain, View::Side), Path::new("assets/characters/hero_side.png"));

        let front = Path::new("assets/characters/hero_front.jpg");
        assert_eq!(view_path(front, View::Back), Path::new("assets/characters/hero_back.jpg"));

        let already = Path::new("assets/characters/hero_side.png");
        assert_eq!(view_path(already, View::Side), already);

        let bare = Path::new("assets/characters/hero");
        assert_eq!(view_path(bare, View::Side), Path::new("assets/characters/hero_side.png"));
    }

    #[test]
    fn test_strip_paths() {
        assert_eq!(
            strip_path(Path::new("assets/characters/hero_front.png"), DEFAULT_STRIP_SUFFIX),
            Path::new("assets/characters/hero_refstrip.png")
        );
        assert_eq!(
            strip_path(Path::new("assets/characters/hero.webp"), "_strip"),
            Path::new("assets/characters/hero_strip.webp")
        );
        assert!(is_strip_path(Path::new("assets/characters/hero_refstrip.png"), "_refstrip"));
        assert!(!is_strip_path(Path::new("assets/objects/hero_refstrip.png"), "_refstrip"));
        assert!(!is_strip_path(Path::new("assets/characters/hero_refstrip.png"), " "));
    }

    #[test]
    fn test_parse_and_order_views() {
        assert_eq!(parse_views("back, side,,side").unwrap(), vec![View::Side, View::Back]);
        assert!(parse_views("top").is_err());
        assert_eq!(views_to_generate(&[View::Back]), vec![View::Front, View::Back]);
        assert_eq!(views_to_generate(&[]), vec![View::Front]);
    }

    #[test]
    fn test_view_prompt_goes_under_scene_heading() {
        let prompt = "[SCENE]\nA hero on a cliff.\n\n[AVOID]\ntext";
        let side = view_prompt(prompt, View::Side);
        let lines: Vec<&str> = side.lines().collect();
        assert_eq!(lines[0], "[SCENE]");
        assert_eq!(lines[1], "キャラクター参照画像: 左側面（LEFT SIDE）ビュー。");
        assert!(side.contains("[AVOID]\ntext"));
    }

    #[test]
    fn test_prefer_strips_keeps_other_refs() {
        let refs = vec![
            PathBuf::from("assets/characters/hero.png"),
            PathBuf::from("assets/characters/hero_refstrip.png"),
            PathBuf::from("assets/objects/gate.png"),
        ];
        assert_eq!(
            prefer_strips(refs.clone(), "_refstrip"),
            vec![
                PathBuf::from("assets/characters/hero_refstrip.png"),
                PathBuf::from("assets/objects/gate.png"),
            ]
        );
        let no_strip = vec![PathBuf::from("assets/characters/hero.png")];
        assert_eq!(prefer_strips(no_strip.clone(), "_refstrip"), no_strip);
    }
}
