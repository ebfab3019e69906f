//! Synthesis prompt construction. Pure string assembly, no I/O.

use super::schema::PacketSchema;
use super::synthesizer::SynthesisInput;
use crate::candidate::render_card;
use crate::profile::CreatorProfile;

/// Grounding rules rendered verbatim into every synthesis system prompt.
pub const GROUNDING_RULES: &str = "\
NON-NEGOTIABLE RULES:
1. Ground every module, lesson, claim and example in the creator content provided. Never write generic filler, placeholder text, invented testimonials or claims the content does not support.
2. Write every line in the creator's own voice as described. Never fall back to a neutral, corporate or generic voice.
3. Use the creator's visual tokens exactly as given. Do not override the palette, font or mood, except to adjust colour contrast where needed for accessibility.";

/// Build the system prompt for a synthesis call.
pub fn build_system_prompt(input: &SynthesisInput<'_>) -> String {
    format!(
        "You are a product strategist for {name}, turning their existing content into a sellable {label}.\n\
         Respond with a single JSON object and nothing else.\n\n\
         {GROUNDING_RULES}\n",
        name = input.profile.display_name,
        label = input.product_type.label(),
    )
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    out.push_str("## ");
    out.push_str(heading);
    out.push('\n');
    out.push_str(body.trim_end());
    out.push_str("\n\n");
}

fn render_voice(profile: &CreatorProfile) -> String {
    let voice = &profile.voice;
    let catchphrases = if voice.catchphrases.is_empty() {
        "(none)".to_string()
    } else {
        voice
            .catchphrases
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Tone: {}\nVocabulary: {}\nSpeaking style: {}\nCatchphrases: {catchphrases}\nPersonality: {}\nContent focus: {}",
        voice.tone, voice.vocabulary, voice.speaking_style, voice.personality, voice.content_focus
    )
}

fn render_visual(profile: &CreatorProfile) -> String {
    let visual = &profile.visual;
    format!(
        "Palette: {}\nFont: {}\nMood: {}",
        visual.palette.join(", "),
        visual.font,
        visual.mood
    )
}

/// Build the user prompt for a synthesis call.
///
/// Content items appear in the order given, which is the reranker's
/// significance order.
pub fn build_user_prompt(input: &SynthesisInput<'_>, schema: &PacketSchema) -> String {
    let mut out = String::new();

    push_section(
        &mut out,
        "Creator",
        &format!(
            "Name: {}\nHandle: @{}",
            input.profile.display_name, input.profile.handle
        ),
    );
    push_section(&mut out, "Voice", &render_voice(input.profile));
    push_section(&mut out, "Visual identity", &render_visual(input.profile));

    let mut request = format!(
        "Product type: {}\nBrief: {}",
        input.product_type.label(),
        input.brief.trim()
    );
    if let Some(audience) = input.audience {
        request.push_str(&format!("\nTarget audience: {audience}"));
    }
    if let Some(tone) = input.tone {
        request.push_str(&format!(
            "\nTone adjustment (apply on top of the creator's voice, do not replace it): {tone}"
        ));
    }
    if let Some(mood) = input.mood {
        request.push_str(&format!(
            "\nMood adjustment (apply within the creator's visual identity): {mood}"
        ));
    }
    push_section(&mut out, "Request", &request);

    let mut content = String::new();
    for (i, item) in input.content.iter().enumerate() {
        content.push_str(&format!(
            "[{n}] id: {id}\ntitle: {title}\nwhy it matters: {reason}\n{card}\n\n",
            n = i + 1,
            id = item.candidate_id,
            title = item.title.as_deref().unwrap_or("(untitled)"),
            reason = item.reason,
            card = render_card(&item.summary_card),
        ));
    }
    push_section(&mut out, "Source content (most important first)", &content);

    push_section(
        &mut out,
        "Output shape",
        &format!(
            "Return a JSON object with these fields. Reference source content by id in any source_ids field.\n{}",
            schema.describe()
        ),
    );

    out
}
