//! Structured prompt sections and line injection
//!
//! Prompts are organised under bracketed headings such as `[CHARACTERS]`.
//! Each section has an English canonical name plus Japanese aliases, and new
//! sections are appended with their Japanese label.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptSection {
    GlobalInvariants,
    Characters,
    PropsSetpieces,
    Scene,
    Continuity,
    Avoid,
}

impl PromptSection {
    pub const ALL: [PromptSection; 6] = [
        PromptSection::GlobalInvariants,
        PromptSection::Characters,
        PromptSection::PropsSetpieces,
        PromptSection::Scene,
        PromptSection::Continuity,
        PromptSection::Avoid,
    ];

    pub fn canonical(&self) -> &'static str {
        match self {
            PromptSection::GlobalInvariants => "GLOBAL / INVARIANTS",
            PromptSection::Characters => "CHARACTERS",
            PromptSection::PropsSetpieces => "PROPS / SETPIECES",
            PromptSection::Scene => "SCENE",
            PromptSection::Continuity => "CONTINUITY",
            PromptSection::Avoid => "AVOID",
        }
    }

    /// Heading texts accepted when looking for an existing section
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            PromptSection::GlobalInvariants => &[
                "GLOBAL / INVARIANTS",
                "全体 / 不変条件",
                "全体/不変条件",
                "グローバル / 不変条件",
            ],
            PromptSection::Characters => &["CHARACTERS", "登場人物", "キャラクター"],
            PromptSection::PropsSetpieces => &[
                "PROPS / SETPIECES",
                "小道具 / 舞台装置",
                "小道具/舞台装置",
                "プロップ / 舞台装置",
            ],
            PromptSection::Scene => &["SCENE", "シーン", "場面"],
            PromptSection::Continuity => &["CONTINUITY", "連続性", "つながり"],
            PromptSection::Avoid => &["AVOID", "禁止", "避けること", "NG"],
        }
    }

    /// Heading text used when the section has to be created
    pub fn label(&self) -> &'static str {
        match self {
            PromptSection::GlobalInvariants => "全体 / 不変条件",
            PromptSection::Characters => "登場人物",
            PromptSection::PropsSetpieces => "小道具 / 舞台装置",
            PromptSection::Scene => "シーン",
            PromptSection::Continuity => "連続性",
            PromptSection::Avoid => "禁止",
        }
    }

    fn matches_line(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
            return false;
        };
        self.aliases().contains(&inner)
    }
}

impl fmt::Display for PromptSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Index of the first line that is a heading for `section`
pub fn find_heading(lines: &[&str], section: PromptSection) -> Option<usize> {
    lines.iter().position(|line| section.matches_line(line))
}

/// Insert lines right after the section heading, skipping any line already
/// present anywhere in the prompt. Without a heading a new section is appended.
pub fn inject_lines(prompt: &str, section: PromptSection, lines_to_add: &[String]) -> String {
    let lines: Vec<&str> = prompt.lines().collect();
    let mut seen: Vec<&str> = lines.iter().map(|l| l.trim()).collect();
    let mut to_add: Vec<&str> = Vec::new();
    for line in lines_to_add {
        let line = line.trim();
        if line.is_empty() || seen.contains(&line) {
            continue;
        }
        seen.push(line);
        to_add.push(line);
    }
    if to_add.is_empty() {
        return prompt.to_string();
    }

    match find_heading(&lines, section) {
        Some(idx) => {
            let mut out: Vec<&str> = Vec::with_capacity(lines.len() + to_add.len());
            out.extend_from_slice(&lines[..=idx]);
            out.extend_from_slice(&to_add);
            out.extend_from_slice(&lines[idx + 1..]);
            out.join("\n").trim_end().to_string()
        }
        None => {
            let heading = format!("[{}]", section.label());
            let block = std::iter::once(heading.as_str())
                .chain(to_add.iter().copied())
                .collect::<Vec<_>>()
                .join("\n");
            if prompt.trim().is_empty() {
                block
            } else {
                format!("{}\n\n{}", prompt.trim_end(), block)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_inserts_after_existing_heading() {
        let prompt = "[SCENE]\nA quiet harbor.\n\n[AVOID]\nlens flare";
        let out = inject_lines(prompt, PromptSection::Avoid, &lines(&["anime"]));
        assert_eq!(out, "[SCENE]\nA quiet harbor.\n\n[AVOID]\nanime\nlens flare");
    }

    #[test]
    fn test_matches_japanese_alias() {
        let prompt = "[登場人物]\n  \n[シーン]\n港";
        let out = inject_lines(prompt, PromptSection::Characters, &lines(&["red scarf"]));
        assert_eq!(out, "[登場人物]\nred scarf\n  \n[シーン]\n港");
    }

    #[test]
    fn test_appends_missing_section_with_label() {
        let out = inject_lines("A quiet harbor.\n", PromptSection::Avoid, &lines(&["anime"]));
        assert_eq!(out, "A quiet harbor.\n\n[禁止]\nanime");

        let out = inject_lines("", PromptSection::GlobalInvariants, &lines(&["watercolor"]));
        assert_eq!(out, "[全体 / 不変条件]\nwatercolor");
    }

    #[test]
    fn test_injection_is_idempotent() {
        let once = inject_lines("[SCENE]\nharbor", PromptSection::Avoid, &lines(&["anime"]));
        let twice = inject_lines(&once, PromptSection::Avoid, &lines(&["anime", "anime"]));
        assert_eq!(once, twice);
        assert_eq!(twice.matches("anime").count(), 1);
    }

    #[test]
    fn test_blank_and_duplicate_inputs_are_dropped() {
        let out = inject_lines(
            "[CHARACTERS]",
            PromptSection::Characters,
            &lines(&["", " tall ", "tall"]),
        );
        assert_eq!(out, "[CHARACTERS]\ntall");
    }
}
