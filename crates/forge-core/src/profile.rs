//! Creator identity, voice and visual settings injected into synthesis.
//!
//! Every field has a default so an unconfigured creator never blocks
//! generation. Stored settings are read leniently: a blank or wrongly typed
//! value falls back to the default for that field only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Handle used when a creator has no saved profile at all.
pub const DEFAULT_HANDLE: &str = "creator";

pub const DEFAULT_TONE: &str = "warm, encouraging and direct";
pub const DEFAULT_VOCABULARY: &str = "plain everyday language, no jargon";
pub const DEFAULT_SPEAKING_STYLE: &str = "conversational, second person, short sentences";
pub const DEFAULT_PERSONALITY: &str = "a knowledgeable friend who has done this before";
pub const DEFAULT_CONTENT_FOCUS: &str = "practical lessons drawn from the creator's own videos";
pub const DEFAULT_PALETTE: [&str; 3] = ["#1F2937", "#F9FAFB", "#6366F1"];
pub const DEFAULT_FONT: &str = "Inter";
pub const DEFAULT_MOOD: &str = "clean and modern";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub tone: String,
    pub vocabulary: String,
    pub speaking_style: String,
    /// May be empty.
    pub catchphrases: Vec<String>,
    pub personality: String,
    pub content_focus: String,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            tone: DEFAULT_TONE.to_string(),
            vocabulary: DEFAULT_VOCABULARY.to_string(),
            speaking_style: DEFAULT_SPEAKING_STYLE.to_string(),
            catchphrases: Vec::new(),
            personality: DEFAULT_PERSONALITY.to_string(),
            content_focus: DEFAULT_CONTENT_FOCUS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualProfile {
    /// Hex colours, primary first.
    pub palette: Vec<String>,
    pub font: String,
    pub mood: String,
}

impl Default for VisualProfile {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            font: DEFAULT_FONT.to_string(),
            mood: DEFAULT_MOOD.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub handle: String,
    pub display_name: String,
    pub voice: VoiceProfile,
    pub visual: VisualProfile,
}

impl CreatorProfile {
    /// Profile with every setting defaulted. Display name equals the handle.
    pub fn with_defaults(handle: impl Into<String>) -> Self {
        let handle = handle.into();
        Self {
            display_name: handle.clone(),
            handle,
            voice: VoiceProfile::default(),
            visual: VisualProfile::default(),
        }
    }

    /// Build a profile from stored JSON settings, defaulting per field.
    pub fn from_settings(
        handle: &str,
        display_name: Option<&str>,
        voice: &Value,
        visual: &Value,
    ) -> Self {
        let handle = non_blank(Some(handle)).unwrap_or(DEFAULT_HANDLE).to_string();
        let display_name = non_blank(display_name).unwrap_or(&handle).to_string();

        let voice_defaults = VoiceProfile::default();
        let voice = VoiceProfile {
            tone: text_or(voice, "tone", voice_defaults.tone),
            vocabulary: text_or(voice, "vocabulary", voice_defaults.vocabulary),
            speaking_style: text_or(voice, "speaking_style", voice_defaults.speaking_style),
            catchphrases: list_field(voice, "catchphrases").unwrap_or_default(),
            personality: text_or(voice, "personality", voice_defaults.personality),
            content_focus: text_or(voice, "content_focus", voice_defaults.content_focus),
        };

        let visual_defaults = VisualProfile::default();
        let visual = VisualProfile {
            palette: list_field(visual, "palette")
                .filter(|p| !p.is_empty())
                .unwrap_or(visual_defaults.palette),
            font: text_or(visual, "font", visual_defaults.font),
            mood: text_or(visual, "mood", visual_defaults.mood),
        };

        Self {
            handle,
            display_name,
            voice,
            visual,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn text_or(settings: &Value, key: &str, default: String) -> String {
    non_blank(settings.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or(default)
}

/// A list setting given either as a JSON array of strings or as one
/// comma-separated string. Blank entries are dropped.
fn list_field(settings: &Value, key: &str) -> Option<Vec<String>> {
    let items: Vec<String> = match settings.get(key)? {
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(text) => text.split(',').map(str::to_string).collect(),
        _ => return None,
    };
    Some(
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_settings_use_defaults() {
        let profile = CreatorProfile::from_settings("yogasam", None, &json!({}), &json!({}));
        assert_eq!(profile.handle, "yogasam");
        assert_eq!(profile.display_name, "yogasam");
        assert_eq!(profile.voice, VoiceProfile::default());
        assert_eq!(profile.visual, VisualProfile::default());
        assert_eq!(profile, CreatorProfile::with_defaults("yogasam"));
    }

    #[test]
    fn configured_fields_override_defaults() {
        let profile = CreatorProfile::from_settings(
            "yogasam",
            Some("Sam Rivera"),
            &json!({ "tone": "calm", "catchphrases": ["Breathe into it", " "] }),
            &json!({ "palette": ["#0F766E"], "font": "Fraunces" }),
        );
        assert_eq!(profile.display_name, "Sam Rivera");
        assert_eq!(profile.voice.tone, "calm");
        assert_eq!(profile.voice.vocabulary, DEFAULT_VOCABULARY);
        assert_eq!(profile.voice.catchphrases, vec!["Breathe into it"]);
        assert_eq!(profile.visual.palette, vec!["#0F766E"]);
        assert_eq!(profile.visual.font, "Fraunces");
        assert_eq!(profile.visual.mood, DEFAULT_MOOD);
    }

    #[test]
    fn blank_and_mistyped_values_fall_back() {
        let profile = CreatorProfile::from_settings(
            "  ",
            Some(""),
            &json!({ "tone": "   ", "personality": 42 }),
            &json!({ "palette": [], "mood": null }),
        );
        assert_eq!(profile.handle, DEFAULT_HANDLE);
        assert_eq!(profile.display_name, DEFAULT_HANDLE);
        assert_eq!(profile.voice.tone, DEFAULT_TONE);
        assert_eq!(profile.voice.personality, DEFAULT_PERSONALITY);
        assert_eq!(profile.visual.palette.len(), DEFAULT_PALETTE.len());
        assert_eq!(profile.visual.mood, DEFAULT_MOOD);
    }

    #[test]
    fn comma_separated_lists_are_split() {
        let profile = CreatorProfile::from_settings(
            "c",
            None,
            &json!({ "catchphrases": "Let's go!, You got this" }),
            &json!({ "palette": "#111111,#eeeeee" }),
        );
        assert_eq!(profile.voice.catchphrases, vec!["Let's go!", "You got this"]);
        assert_eq!(profile.visual.palette, vec!["#111111", "#eeeeee"]);
    }

    #[test]
    fn non_object_settings_are_ignored() {
        let profile = CreatorProfile::from_settings("c", None, &json!("oops"), &Value::Null);
        assert_eq!(profile.voice, VoiceProfile::default());
    }
}
