use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of poster templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateId {
    Midnight,
    Aurora,
    Slate,
    Sunrise,
    Matrix,
    Paper,
}

pub const DEFAULT_TEMPLATE: TemplateId = TemplateId::Midnight;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub title: &'static str,
    pub body: &'static str,
    pub accent: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    pub id: TemplateId,
    pub label: &'static str,
    pub description: &'static str,
    pub palette: Palette,
    pub bullet_prefix: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewContent {
    pub title: String,
    pub bullets: Vec<String>,
    pub url: String,
}

impl TemplateId {
    pub const ALL: [TemplateId; 6] = [
        TemplateId::Midnight,
        TemplateId::Aurora,
        TemplateId::Slate,
        TemplateId::Sunrise,
        TemplateId::Matrix,
        TemplateId::Paper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::Midnight => "midnight",
            TemplateId::Aurora => "aurora",
            TemplateId::Slate => "slate",
            TemplateId::Sunrise => "sunrise",
            TemplateId::Matrix => "matrix",
            TemplateId::Paper => "paper",
        }
    }

    /// Case- and whitespace-insensitive lookup; `None` for unknown ids.
    pub fn parse(value: &str) -> Option<Self> {
        let key = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|id| id.as_str() == key)
    }

    /// Like [`TemplateId::parse`], falling back to `default` for unknown ids.
    pub fn parse_or(value: &str, default: TemplateId) -> Self {
        Self::parse(value).unwrap_or(default)
    }

    pub fn info(&self) -> TemplateInfo {
        let (label, description, palette, bullet_prefix) = match self {
            TemplateId::Midnight => (
                "Midnight Neon",
                "Deep navy base with subtle glow and a crisp divider bar.",
                Palette {
                    background: "#0B1020",
                    title: "#FFFFFF",
                    body: "#DCE3FF",
                    accent: "#22263D",
                },
                "\u{2022}",
            ),
            TemplateId::Aurora => (
                "Aurora Glow",
                "Vibrant purple/teal gradient with soft wave overlays.",
                Palette {
                    background: "#070815",
                    title: "#F8FAFC",
                    body: "#E0EAFF",
                    accent: "#F0ABFC",
                },
                "\u{25CF}",
            ),
            TemplateId::Slate => (
                "Slate Minimal",
                "Bright, editorial layout with a bold accent block.",
                Palette {
                    background: "#F8FAFC",
                    title: "#0F172A",
                    body: "#334155",
                    accent: "#BE123C",
                },
                "\u{2014}",
            ),
            TemplateId::Sunrise => (
                "Sunrise Pulse",
                "Warm coral-to-peach gradient with translucent cards.",
                Palette {
                    background: "#14051E",
                    title: "#FFF7ED",
                    body: "#FFEDD5",
                    accent: "#F97316",
                },
                "\u{25B8}",
            ),
            TemplateId::Matrix => (
                "Synthwave Matrix",
                "Black glass canvas with neon grid and holo bullets.",
                Palette {
                    background: "#020617",
                    title: "#E0F2FE",
                    body: "#BAE6FD",
                    accent: "#0F172A",
                },
                "\u{258B}",
            ),
            TemplateId::Paper => (
                "Newsprint Retro",
                "Cream paper texture with serif headlines and accent bar.",
                Palette {
                    background: "#FFFBF5",
                    title: "#1C1917",
                    body: "#3E2723",
                    accent: "#FDBA74",
                },
                "\u{2023}",
            ),
        };

        TemplateInfo {
            id: *self,
            label,
            description,
            palette,
            bullet_prefix,
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplicate and validate requested template ids.
///
/// Unknown ids are dropped; if nothing valid remains the result is `[default]`.
pub fn resolve_templates<S: AsRef<str>>(requested: &[S], default: TemplateId) -> Vec<TemplateId> {
    let mut resolved = Vec::new();
    for value in requested {
        if let Some(id) = TemplateId::parse(value.as_ref()) {
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
    }
    if resolved.is_empty() {
        resolved.push(default);
    }
    resolved
}

pub fn catalogue() -> Vec<TemplateInfo> {
    TemplateId::ALL.iter().map(TemplateId::info).collect()
}

/// Sample content for previewing a template without running the pipeline.
pub fn preview_content(id: TemplateId) -> PreviewContent {
    let title = match id {
        TemplateId::Midnight => "Midnight Headlines: AI and Security",
        _ => "AI Pulse: Generative breakthroughs you should know",
    };
    PreviewContent {
        title: title.to_string(),
        bullets: vec![
            "Chipmakers unveil low-power NPUs for edge laptops.".to_string(),
            "Open-source models close the gap with flagship labs.".to_string(),
            "Design leaders debate how much AI belongs in the UI.".to_string(),
        ],
        url: "https://demo.techposter.local/sample".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(TemplateId::parse(" Aurora "), Some(TemplateId::Aurora));
        assert_eq!(TemplateId::parse("PAPER"), Some(TemplateId::Paper));
        assert_eq!(TemplateId::parse("comic-sans"), None);
        assert_eq!(TemplateId::parse(""), None);
    }

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(
            TemplateId::parse_or("nope", TemplateId::Slate),
            TemplateId::Slate
        );
    }

    #[test]
    fn test_resolve_dedupes_and_keeps_order() {
        let resolved = resolve_templates(&["slate", "aurora", "SLATE", "bogus"], DEFAULT_TEMPLATE);
        assert_eq!(resolved, vec![TemplateId::Slate, TemplateId::Aurora]);
    }

    #[test]
    fn test_resolve_empty_or_unknown_uses_default() {
        let empty: [&str; 0] = [];
        assert_eq!(
            resolve_templates(&empty, TemplateId::Matrix),
            vec![TemplateId::Matrix]
        );
        assert_eq!(
            resolve_templates(&["unknown"], DEFAULT_TEMPLATE),
            vec![TemplateId::Midnight]
        );
    }

    #[test]
    fn test_catalogue_covers_every_template() {
        let infos = catalogue();
        assert_eq!(infos.len(), TemplateId::ALL.len());
        for (info, id) in infos.iter().zip(TemplateId::ALL) {
            assert_eq!(info.id, id);
            assert!(!info.label.is_empty());
        }
    }

    #[test]
    fn test_serde_uses_lowercase_ids() {
        let json = serde_json::to_string(&TemplateId::Sunrise).unwrap();
        assert_eq!(json, "\"sunrise\"");
    }
}
