use stylematrix_contracts::themes::ColorTheme;

/// Builds the full text instruction sent alongside the reference image.
pub fn compose_prompt(theme: &ColorTheme, style_prompt: &str) -> String {
    format!(
        "{}\n\nVariation Style Task: Render the provided subject using this specific technique: \"{}\".\n\nCRITICAL: Do not change the character's pose, silhouette, or direction. ONLY change the texture/rendering style to match the task.",
        matrix_rules(theme),
        style_prompt.trim()
    )
}

fn matrix_rules(theme: &ColorTheme) -> String {
    format!(
        "You are a master graphic designer creating a monochrome style matrix.\n\n\
MANDATORY RULES:\n\
1. CHARACTER CONSISTENCY: Keep the EXACT identity, silhouette, pose, and face direction of the reference subject. Only change the rendering medium.\n\
2. COLOR: Use ONLY {name} (Hex {ink}) ink on a warm paper background (Hex {paper}). No black, no grays.\n\
3. COMPOSITION: Center the subject. Maintain uniform scale across all variations.\n\
4. RISO FEEL: Add subtle print texture and clean edges.",
        name = theme.name,
        ink = theme.ink_hex,
        paper = theme.paper_hex,
    )
}
