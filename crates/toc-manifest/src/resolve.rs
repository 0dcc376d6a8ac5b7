//! Asset guide resolution: merge bible references and prompt lines into scenes

use crate::guides::AssetGuides;
use crate::prompt::{inject_lines, PromptSection};
use crate::scene::SceneSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use toc_core::TocError;

/// How character bible references are added to each scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterRefsMode {
    /// Never add character references
    None,
    /// Add references of the characters listed in the scene's `character_ids`
    Scene,
    /// Add every character's references
    All,
    /// Add references only when the bible holds exactly one character
    #[default]
    Auto,
}

impl FromStr for CharacterRefsMode {
    type Err = TocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(CharacterRefsMode::None),
            "scene" => Ok(CharacterRefsMode::Scene),
            "all" => Ok(CharacterRefsMode::All),
            "auto" => Ok(CharacterRefsMode::Auto),
            other => Err(TocError::Config(format!(
                "Unknown character refs mode '{}'. Available: scene, auto, all, none",
                other
            ))),
        }
    }
}

impl fmt::Display for CharacterRefsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterRefsMode::None => write!(f, "none"),
            CharacterRefsMode::Scene => write!(f, "scene"),
            CharacterRefsMode::All => write!(f, "all"),
            CharacterRefsMode::Auto => write!(f, "auto"),
        }
    }
}

/// Ordered, de-duplicated merge that never includes `exclude`
pub fn merge_refs<'a>(
    existing: impl IntoIterator<Item = &'a String>,
    extra: impl IntoIterator<Item = &'a String>,
    exclude: Option<&str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in existing.into_iter().chain(extra) {
        let item = item.trim();
        if item.is_empty() || Some(item) == exclude || !seen.insert(item.to_string()) {
            continue;
        }
        out.push(item.to_string());
    }
    out
}

/// Character references the mode adds for this scene
fn character_refs<'g>(
    scene: &SceneSpec,
    guides: &'g AssetGuides,
    mode: CharacterRefsMode,
) -> Vec<&'g String> {
    let bible = &guides.character_bible;
    match mode {
        CharacterRefsMode::None => Vec::new(),
        CharacterRefsMode::All => bible.iter().flat_map(|c| &c.reference_images).collect(),
        CharacterRefsMode::Auto if bible.len() == 1 => bible[0].reference_images.iter().collect(),
        CharacterRefsMode::Auto => Vec::new(),
        CharacterRefsMode::Scene => {
            let chosen = scene.image.character_ids();
            bible
                .iter()
                .filter(|c| {
                    c.character_id
                        .as_ref()
                        .map(|id| chosen.contains(id))
                        .unwrap_or(false)
                })
                .flat_map(|c| &c.reference_images)
                .collect()
        }
    }
}

/// Return a copy of `scene` with guide references merged and guide prompt lines
/// injected for the characters and objects active in it.
///
/// The scene's own image output is never added as a reference, so a scene that
/// renders a bible reference image does not condition on itself.
pub fn apply_asset_guides(
    scene: &SceneSpec,
    guides: &AssetGuides,
    mode: CharacterRefsMode,
) -> SceneSpec {
    let exclude = scene.image.output.as_deref();
    let chosen_objects = scene.image.object_ids();

    let object_refs: Vec<&String> = guides
        .object_bible
        .iter()
        .filter(|o| {
            o.object_id
                .as_ref()
                .map(|id| chosen_objects.contains(id))
                .unwrap_or(false)
        })
        .flat_map(|o| &o.reference_images)
        .collect();

    let merged = merge_refs(&scene.image.references, guides.style_references(), exclude);
    let merged = merge_refs(&merged, character_refs(scene, guides, mode), exclude);
    let merged = merge_refs(&merged, object_refs, exclude);

    let mut resolved = scene.clone();
    resolved.image.references = merged;

    let Some(prompt) = scene.image.prompt.as_deref() else {
        return resolved;
    };

    let ref_set: HashSet<&str> = resolved.image.references.iter().map(String::as_str).collect();
    let generates = |refs: &[String]| exclude.map(|out| refs.iter().any(|r| r == out)).unwrap_or(false);
    let intersects = |refs: &[String]| refs.iter().any(|r| ref_set.contains(r.as_str()));

    let mut global_lines = Vec::new();
    let mut avoid_lines = Vec::new();
    if let Some(style) = &guides.style_guide {
        global_lines.extend(style.visual_style.iter().cloned());
        avoid_lines.extend(style.forbidden.iter().cloned());
    }

    let chosen_characters = scene.image.character_ids();
    let mut character_lines = Vec::new();
    for entry in &guides.character_bible {
        let active = if mode == CharacterRefsMode::Scene && !chosen_characters.is_empty() {
            entry
                .character_id
                .as_ref()
                .map(|id| chosen_characters.contains(id))
                .unwrap_or(false)
        } else {
            intersects(&entry.reference_images)
        };
        if active || generates(&entry.reference_images) {
            character_lines.extend(entry.fixed_prompts.iter().cloned());
        }
    }

    let mut prop_lines = Vec::new();
    for entry in &guides.object_bible {
        let Some(object_id) = &entry.object_id else {
            continue;
        };
        let active = chosen_objects.contains(object_id)
            || intersects(&entry.reference_images)
            || generates(&entry.reference_images);
        if !active {
            continue;
        }
        prop_lines.extend(entry.fixed_prompts.iter().cloned());
        if let Some(role) = &entry.cinematic_role {
            prop_lines.push(format!("映画での役割: {}", role));
        }
        for takeaway in &entry.visual_takeaways {
            prop_lines.push(format!("映像から伝える情報: {}", takeaway));
        }
        for detail in &entry.spectacle_details {
            prop_lines.push(format!("見せ場ディテール: {}", detail));
        }
    }

    let mut prompt = prompt.to_string();
    for (section, lines) in [
        (PromptSection::GlobalInvariants, &global_lines),
        (PromptSection::Characters, &character_lines),
        (PromptSection::PropsSetpieces, &prop_lines),
        (PromptSection::Avoid, &avoid_lines),
    ] {
        if !lines.is_empty() {
            prompt = inject_lines(&prompt, section, lines);
        }
    }
    resolved.image.prompt = Some(prompt);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guides::{CharacterBibleEntry, ObjectBibleEntry, StyleGuideSpec};

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn character(id: &str, refs: &[&str], prompts: &[&str]) -> CharacterBibleEntry {
        CharacterBibleEntry {
            character_id: Some(s(id)),
            reference_images: refs.iter().map(|r| s(r)).collect(),
            fixed_prompts: prompts.iter().map(|p| s(p)).collect(),
            notes: None,
        }
    }

    fn story_scene(id: i64, output: &str, prompt: &str) -> SceneSpec {
        let mut scene = SceneSpec::new(id);
        scene.image.output = Some(s(output));
        scene.image.prompt = Some(s(prompt));
        scene
    }

    fn hero_guides() -> AssetGuides {
        AssetGuides {
            character_bible: vec![character(
                "hero",
                &["assets/characters/hero.png"],
                &["red scarf, short black hair"],
            )],
            style_guide: Some(StyleGuideSpec {
                visual_style: Some(s("soft watercolor")),
                forbidden: vec![s("anime")],
                reference_images: vec![s("assets/style/palette.png")],
            }),
            object_bible: vec![],
        }
    }

    #[test]
    fn test_end_to_end_hero_scenario() {
        let guides = hero_guides();
        let reference = story_scene(0, "assets/characters/hero.png", "[SCENE]\nhero turnaround");
        let mut story = story_scene(1, "assets/scenes/scene1.png", "[SCENE]\nhero on the pier");
        story.image.character_ids = Some(vec![s("hero")]);

        let reference = apply_asset_guides(&reference, &guides, CharacterRefsMode::Scene);
        let story = apply_asset_guides(&story, &guides, CharacterRefsMode::Scene);

        assert!(story
            .image
            .references
            .contains(&s("assets/characters/hero.png")));
        assert!(story.image.references.contains(&s("assets/style/palette.png")));
        let prompt = story.image.prompt.unwrap();
        assert!(prompt.contains("[禁止]\nanime"));
        assert!(prompt.contains("red scarf, short black hair"));

        assert!(!reference
            .image
            .references
            .contains(&s("assets/characters/hero.png")));
        // generating the reference makes the character active
        assert!(reference
            .image
            .prompt
            .unwrap()
            .contains("red scarf, short black hair"));
    }

    #[test]
    fn test_self_reference_excluded_but_kept_for_others() {
        let guides = hero_guides();
        let own = story_scene(5, "assets/characters/hero.png", "p");
        let other = story_scene(6, "assets/scenes/scene6.png", "p");
        let own = apply_asset_guides(&own, &guides, CharacterRefsMode::All);
        let other = apply_asset_guides(&other, &guides, CharacterRefsMode::All);
        assert_eq!(own.image.references, vec!["assets/style/palette.png"]);
        assert_eq!(
            other.image.references,
            vec!["assets/style/palette.png", "assets/characters/hero.png"]
        );
    }

    #[test]
    fn test_auto_mode_requires_single_character() {
        let mut guides = hero_guides();
        let scene = story_scene(1, "assets/scenes/scene1.png", "p");

        let single = apply_asset_guides(&scene, &guides, CharacterRefsMode::Auto);
        assert!(single
            .image
            .references
            .contains(&s("assets/characters/hero.png")));

        guides
            .character_bible
            .push(character("rival", &["assets/characters/rival.png"], &[]));
        let ambiguous = apply_asset_guides(&scene, &guides, CharacterRefsMode::Auto);
        assert_eq!(ambiguous.image.references, vec!["assets/style/palette.png"]);
    }

    #[test]
    fn test_none_mode_and_dedup() {
        let guides = hero_guides();
        let mut scene = story_scene(2, "assets/scenes/scene2.png", "p");
        scene.image.references = vec![s("assets/style/palette.png"), s(" assets/style/palette.png ")];
        let resolved = apply_asset_guides(&scene, &guides, CharacterRefsMode::None);
        assert_eq!(resolved.image.references, vec!["assets/style/palette.png"]);
        assert!(!resolved.image.prompt.unwrap().contains("red scarf"));
    }

    #[test]
    fn test_object_activation_and_lines() {
        let guides = AssetGuides {
            character_bible: vec![],
            style_guide: None,
            object_bible: vec![
                ObjectBibleEntry {
                    object_id: Some(s("gate")),
                    reference_images: vec![s("assets/objects/gate.png")],
                    fixed_prompts: vec![s("vermilion gate")],
                    cinematic_role: Some(s("threshold")),
                    visual_takeaways: vec![s("scale")],
                    spectacle_details: vec![s("mist at the base")],
                    ..Default::default()
                },
                ObjectBibleEntry {
                    object_id: Some(s("lamp")),
                    reference_images: vec![s("assets/objects/lamp.png")],
                    fixed_prompts: vec![s("paper lamp")],
                    ..Default::default()
                },
            ],
        };
        let mut scene = story_scene(3, "assets/scenes/scene3.png", "[PROPS / SETPIECES]\n");
        scene.image.object_ids = Some(vec![s("gate")]);

        let resolved = apply_asset_guides(&scene, &guides, CharacterRefsMode::Auto);
        assert_eq!(resolved.image.references, vec!["assets/objects/gate.png"]);
        let prompt = resolved.image.prompt.unwrap();
        assert_eq!(
            prompt,
            "[PROPS / SETPIECES]\nvermilion gate\n映画での役割: threshold\n映像から伝える情報: scale\n見せ場ディテール: mist at the base"
        );

        let lamp_ref = story_scene(4, "assets/objects/lamp.png", "lamp sheet");
        let lamp_ref = apply_asset_guides(&lamp_ref, &guides, CharacterRefsMode::Auto);
        assert!(lamp_ref.image.references.is_empty());
        assert!(lamp_ref.image.prompt.unwrap().contains("paper lamp"));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("Scene".parse::<CharacterRefsMode>().unwrap(), CharacterRefsMode::Scene);
        assert_eq!(CharacterRefsMode::default().to_string(), "auto");
        assert!("sometimes".parse::<CharacterRefsMode>().is_err());
    }
}
