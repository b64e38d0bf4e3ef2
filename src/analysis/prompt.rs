use serde_json::{json, Value};

use crate::state::Language;

/// Instruction sent after the frames in an analysis request
pub fn build_analysis_prompt(language: Language) -> String {
    let lang = language.display_name();
    format!(
        "You are a professional YouTube growth expert. Based on these frames from a video, \
analyze the content and provide a viral growth package IN {lang}. Include 5 high-CTR titles, \
a compelling SEO-optimized description, 15 relevant tags, a brief engagement strategy, and \
3 specific visual prompts for an AI image generator to create a stunning thumbnail for this \
content. All text output must be in {lang}."
    )
}

/// Instruction sent to the image model for a thumbnail background
pub fn build_thumbnail_prompt(context: &str) -> String {
    format!(
        "Create a professional, high-quality, eye-catching YouTube thumbnail background. \
It should be cinematic and vibrant. Context: {}",
        context.trim()
    )
}

/// Structured-output schema; every field is required
pub fn analysis_response_schema() -> Value {
    let string_array = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
    json!({
        "type": "OBJECT",
        "properties": {
            "viralTitles": string_array,
            "description": { "type": "STRING" },
            "tags": string_array,
            "engagementStrategy": { "type": "STRING" },
            "thumbnailPrompts": string_array
        },
        "required": ["viralTitles", "description", "tags", "engagementStrategy", "thumbnailPrompts"]
    })
}
