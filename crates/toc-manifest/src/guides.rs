//! Asset guides: character, style, and object bibles shared across scenes

use serde::{Deserialize, Serialize};

/// Object kinds the manifest format documents. Others are accepted with a warning.
pub const KNOWN_OBJECT_KINDS: &[&str] = &["setpiece", "artifact", "phenomenon"];

/// A recurring character with reference images and always-on prompt lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterBibleEntry {
    pub character_id: Option<String>,
    pub reference_images: Vec<String>,
    pub fixed_prompts: Vec<String>,
    pub notes: Option<String>,
}

/// Global visual style applied to every scene
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleGuideSpec {
    pub visual_style: Option<String>,
    pub forbidden: Vec<String>,
    pub reference_images: Vec<String>,
}

/// A recurring prop, setpiece, or phenomenon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectBibleEntry {
    pub object_id: Option<String>,
    pub kind: Option<String>,
    pub reference_images: Vec<String>,
    pub fixed_prompts: Vec<String>,
    /// What the object does for the story
    pub cinematic_role: Option<String>,
    pub visual_takeaways: Vec<String>,
    pub spectacle_details: Vec<String>,
    pub notes: Option<String>,
}

impl ObjectBibleEntry {
    /// False when `kind` is set to something outside [`KNOWN_OBJECT_KINDS`]
    pub fn has_known_kind(&self) -> bool {
        match &self.kind {
            Some(kind) => KNOWN_OBJECT_KINDS.contains(&kind.to_lowercase().as_str()),
            None => true,
        }
    }
}

/// All guides declared under `assets`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGuides {
    pub character_bible: Vec<CharacterBibleEntry>,
    pub style_guide: Option<StyleGuideSpec>,
    pub object_bible: Vec<ObjectBibleEntry>,
}

impl AssetGuides {
    /// True when there is nothing to merge into scenes
    pub fn is_empty(&self) -> bool {
        self.character_bible.is_empty() && self.style_guide.is_none() && self.object_bible.is_empty()
    }

    pub fn style_references(&self) -> &[String] {
        self.style_guide
            .as_ref()
            .map(|s| s.reference_images.as_slice())
            .unwrap_or(&[])
    }
}
