//! Line-oriented fallback parser for manifests that full YAML parsing rejects
//!
//! Tracks the enclosing keys with an indentation stack and dispatches each
//! `key: value` line on the block it sits in. Supported: list items
//! (`- key: value`), block scalars (`|`, `>` and their chomping variants),
//! and inline flow lists (`[a, b]`). Multi-line lists are not parsed; for
//! `character_ids` / `object_ids` they only mark the field as present.
//! Cuts are not expanded and asset guides are never read.

use crate::scene::{SceneSpec, VideoMetadata};

const BLOCK_SCALAR_MARKERS: &[&str] = &["|", "|-", "|+", ">", ">-", ">+"];

/// The block a key belongs to, derived from the indentation stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Metadata,
    Image,
    Video,
    Narration,
    /// Directly under a scene, or anywhere else
    Other,
}

struct KeyStack {
    entries: Vec<(usize, String)>,
}

impl KeyStack {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Pop deeper or sibling keys, then push. List items keep a same-indent
    /// parent so indentless sequences (`scenes:` / `- scene_id: 1`) still nest.
    fn push(&mut self, indent: usize, key: &str, is_list_item: bool) {
        while let Some(&(top, _)) = self.entries.last() {
            if indent < top || (!is_list_item && indent <= top) {
                self.entries.pop();
            } else {
                break;
            }
        }
        self.entries.push((indent, key.to_string()));
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(_, k)| k == key)
    }

    fn section(&self) -> Section {
        if self.contains("video_metadata") {
            Section::Metadata
        } else if self.contains("image_generation") {
            Section::Image
        } else if self.contains("video_generation") {
            Section::Video
        } else if self.contains("narration") {
            Section::Narration
        } else {
            Section::Other
        }
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Unquote a plain scalar; blank and `null` are absent
fn scalar(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("null") {
        return None;
    }
    let quoted = v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')));
    if quoted {
        Some(v[1..v.len() - 1].to_string())
    } else {
        Some(v.to_string())
    }
}

/// Multi-line text is kept raw; single-line text is unquoted
fn text(value: &str) -> Option<String> {
    if value.contains('\n') {
        Some(value.to_string())
    } else {
        scalar(value)
    }
}

/// Items of an inline `[a, b]` list, or `None` when the value is not one
fn flow_list(value: &str) -> Option<Vec<String>> {
    let raw = value.trim();
    let inner = raw.strip_prefix('[')?.strip_suffix(']')?.trim();
    Some(
        inner
            .split(',')
            .map(|item| item.trim().trim_matches('"').trim_matches('\'').to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

/// Collect a block scalar starting at `lines[start]`; returns the text and the next line index
fn read_block(lines: &[&str], start: usize) -> (String, usize) {
    let mut block: Vec<&str> = Vec::new();
    let mut block_indent: Option<usize> = None;
    let mut j = start;
    while j < lines.len() {
        let next = lines[j];
        let blank = next.trim().is_empty();
        let indent = match block_indent {
            Some(indent) => indent,
            None if blank => {
                block.push("");
                j += 1;
                continue;
            }
            None => {
                let indent = indent_of(next);
                block_indent = Some(indent);
                indent
            }
        };
        if indent_of(next) < indent {
            if blank {
                // Short blank lines inside a block are kept; only content ends it.
                let ahead = lines[j + 1..].iter().find(|l| !l.trim().is_empty());
                if ahead.map(|l| indent_of(l) >= indent).unwrap_or(false) {
                    block.push("");
                    j += 1;
                    continue;
                }
            }
            break;
        }
        block.push(if blank { "" } else { &next[indent..] });
        j += 1;
    }
    (block.join("\n").trim_end().to_string(), j)
}

/// Parse scenes and metadata line by line
pub fn parse_minimal(yaml_text: &str) -> (VideoMetadata, Vec<SceneSpec>) {
    let mut metadata = VideoMetadata::default();
    let mut scenes: Vec<SceneSpec> = Vec::new();
    let mut current: Option<SceneSpec> = None;
    let mut stack = KeyStack::new();

    let lines: Vec<&str> = yaml_text.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let raw = lines[i];
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }

        let indent = indent_of(raw);
        let (is_list_item, body) = match trimmed.strip_prefix("- ") {
            Some(rest) => (true, rest.trim()),
            None => (false, trimmed),
        };
        let Some((key, value)) = body.split_once(':') else {
            i += 1;
            continue;
        };
        let key = key.trim();
        let mut value = value.trim().to_string();

        stack.push(indent, key, is_list_item);

        if BLOCK_SCALAR_MARKERS.contains(&value.as_str()) {
            let (block, next) = read_block(&lines, i + 1);
            value = block;
            i = next;
        } else {
            i += 1;
        }

        let section = stack.section();
        if section == Section::Metadata {
            match key {
                "topic" => metadata.topic = scalar(&value),
                "aspect_ratio" => metadata.aspect_ratio = scalar(&value),
                "resolution" => metadata.resolution = scalar(&value),
                _ => {}
            }
            continue;
        }

        if key == "scene_id" && stack.contains("scenes") {
            if let Some(done) = current.take() {
                scenes.push(done);
            }
            let scene_id = scalar(&value)
                .unwrap_or_else(|| "0".to_string())
                .parse::<i64>()
                .unwrap_or(scenes.len() as i64 + 1);
            current = Some(SceneSpec::new(scene_id));
            continue;
        }

        let Some(scene) = current.as_mut() else {
            continue;
        };

        if key == "timestamp" && stack.contains("scenes") {
            scene.timestamp = scalar(&value);
            continue;
        }

        match section {
            Section::Image => {
                let image = &mut scene.image;
                match key {
                    "tool" => image.tool = scalar(&value),
                    "prompt" => image.prompt = text(&value),
                    "output" => image.output = scalar(&value),
                    "references" => image.references = flow_list(&value).unwrap_or_default(),
                    "aspect_ratio" => image.aspect_ratio = scalar(&value),
                    "image_size" => image.image_size = scalar(&value),
                    "character_ids" => {
                        image.character_ids = Some(flow_list(&value).unwrap_or_default())
                    }
                    "object_ids" => image.object_ids = Some(flow_list(&value).unwrap_or_default()),
                    _ => {}
                }
            }
            Section::Video => {
                let video = &mut scene.video;
                match key {
                    "tool" => video.tool = scalar(&value),
                    "input_image" => video.input_image = scalar(&value),
                    "first_frame" => video.first_frame = scalar(&value),
                    "last_frame" => video.last_frame = scalar(&value),
                    "motion_prompt" => video.motion_prompt = text(&value),
                    "output" => video.output = scalar(&value),
                    _ => {}
                }
            }
            Section::Narration => {
                let narration = &mut scene.narration;
                match key {
                    "tool" => narration.tool = scalar(&value),
                    "text" => narration.text = text(&value),
                    "output" => narration.output = scalar(&value),
                    "normalize_to_scene_duration" => {
                        let flag = scalar(&value).unwrap_or_default().to_lowercase();
                        if matches!(flag.as_str(), "false" | "no" | "0") {
                            narration.normalize_to_scene_duration = false;
                        }
                    }
                    _ => {}
                }
            }
            Section::Metadata | Section::Other => {}
        }
    }

    if let Some(done) = current {
        scenes.push(done);
    }
    (metadata, scenes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"video_metadata:
  topic: "Night Ferry"
  aspect_ratio: 9:16
scenes:
  - scene_id: 1
    timestamp: "00:00-00:06"
    image_generation:
      tool: google_nanobanana_pro
      prompt: |
        [SCENE]
        A ferry at night.
          Lanterns sway.
      output: assets/scenes/scene1.png
      references: [assets/characters/hero.png, "assets/style/mood.png"]
      character_ids: [hero]
      object_ids:
        - lantern
    video_generation:
      tool: google_veo_3_1
      motion_prompt: "slow push in"
      output: assets/scenes/scene1.mp4
    audio:
      narration:
        tool: elevenlabs
        text: "The river remembers."
        output: assets/audio/scene1.mp3
        normalize_to_scene_duration: false
- scene_id: 2
  image_generation:
    prompt: Dawn over the water
    output: assets/scenes/scene2.png
"#;

    #[test]
    fn test_context_sensitive_fields() {
        let (meta, scenes) = parse_minimal(MANIFEST);
        assert_eq!(meta.topic.as_deref(), Some("Night Ferry"));
        assert_eq!(meta.aspect_ratio.as_deref(), Some("9:16"));
        assert_eq!(scenes.len(), 2);

        let first = &scenes[0];
        assert_eq!(first.scene_id, 1);
        assert_eq!(first.timestamp.as_deref(), Some("00:00-00:06"));
        assert_eq!(first.image.tool.as_deref(), Some("google_nanobanana_pro"));
        assert_eq!(first.video.tool.as_deref(), Some("google_veo_3_1"));
        assert_eq!(first.narration.tool.as_deref(), Some("elevenlabs"));
        assert_eq!(first.image.output.as_deref(), Some("assets/scenes/scene1.png"));
        assert_eq!(first.video.output.as_deref(), Some("assets/scenes/scene1.mp4"));
        assert_eq!(first.narration.output.as_deref(), Some("assets/audio/scene1.mp3"));
        assert_eq!(first.video.motion_prompt.as_deref(), Some("slow push in"));
        assert!(!first.narration.normalize_to_scene_duration);
    }

    #[test]
    fn test_block_scalar_keeps_relative_indent() {
        let (_, scenes) = parse_minimal(MANIFEST);
        assert_eq!(
            scenes[0].image.prompt.as_deref(),
            Some("[SCENE]\nA ferry at night.\n  Lanterns sway.")
        );
    }

    #[test]
    fn test_lists_and_presence() {
        let (_, scenes) = parse_minimal(MANIFEST);
        let image = &scenes[0].image;
        assert_eq!(
            image.references,
            vec!["assets/characters/hero.png", "assets/style/mood.png"]
        );
        assert_eq!(image.character_ids, Some(vec!["hero".to_string()]));
        // multi-line list: presence only
        assert_eq!(image.object_ids, Some(vec![]));
        assert_eq!(scenes[1].image.character_ids, None);
    }

    #[test]
    fn test_indentless_sequence_and_plain_prompt() {
        let (_, scenes) = parse_minimal(MANIFEST);
        let second = &scenes[1];
        assert_eq!(second.scene_id, 2);
        assert_eq!(second.image.prompt.as_deref(), Some("Dawn over the water"));
        assert_eq!(second.narration.output, None);
    }

    #[test]
    fn test_non_numeric_scene_id_uses_position() {
        let yaml = "scenes:\n  - scene_id: 1\n  - scene_id: intro\n";
        let (_, scenes) = parse_minimal(yaml);
        assert_eq!(scenes[1].scene_id, 2);
    }

    #[test]
    fn test_scalar_unquoting() {
        assert_eq!(scalar("\"a: b\""), Some("a: b".to_string()));
        assert_eq!(scalar("'x'"), Some("x".to_string()));
        assert_eq!(scalar("Null"), None);
        assert_eq!(scalar("  "), None);
        assert_eq!(flow_list("[]"), Some(vec![]));
        assert_eq!(flow_list("a, b"), None);
    }
}
