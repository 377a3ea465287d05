use persona_contracts::studio::GenerationRequest;

/// Builds the four-panel character sheet prompt for one selection.
///
/// Resolution and aspect ratio are not part of the text; they travel in the
/// provider's image config.
pub fn build_character_prompt(request: &GenerationRequest) -> String {
    let archetype = request.archetype;
    let keywords = archetype.keywords.join(", ");
    [
        format!(
            "Create a 2x2 grid image (4 panels) featuring the same character for the {} personality type ({}).",
            archetype.code, archetype.name
        ),
        String::new(),
        format!("Character Gender: {}.", request.gender.label()),
        format!("Personality Traits: {keywords}."),
        format!("Description: {}", archetype.description),
        format!("Art Style: {}.", request.style.prompt_modifier),
        String::new(),
        "The image must be split into 4 equal quadrants (2 rows, 2 columns). Each quadrant shows the SAME character in a different variation:".to_string(),
        "1. Top-Left: Close-up portrait with a characteristic facial expression.".to_string(),
        "2. Top-Right: Full-body action shot or dynamic pose.".to_string(),
        format!(
            "3. Bottom-Left: Engaging in a hobby or activity typical for a {}.",
            archetype.name
        ),
        "4. Bottom-Right: A different emotional expression or candid moment reflecting their inner world.".to_string(),
        String::new(),
        "Ensure the character's appearance (hair, features, clothing style) is consistent across all 4 panels.".to_string(),
        "High resolution, detailed, clear separation between panels.".to_string(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use persona_contracts::catalog::{find_archetype, find_style, Gender, ImageSize};
    use persona_contracts::studio::GenerationRequest;

    use super::build_character_prompt;

    fn enfp_watercolor(size: ImageSize) -> GenerationRequest {
        GenerationRequest {
            archetype: find_archetype("ENFP").unwrap(),
            style: find_style("watercolor").unwrap(),
            gender: Gender::Male,
            size,
        }
    }

    #[test]
    fn prompt_carries_archetype_style_and_gender() {
        let prompt = build_character_prompt(&enfp_watercolor(ImageSize::FourK));
        assert!(prompt.contains("for the ENFP personality type (Campaigner)"));
        assert!(prompt.contains("Character Gender: Male."));
        assert!(prompt.contains("Personality Traits: Enthusiastic, Creative, Sociable, Free-spirited."));
        assert!(prompt.contains("Art Style: Soft watercolor painting"));
        assert!(prompt.contains("typical for a Campaigner."));
        assert!(prompt.contains("1. Top-Left"));
        assert!(prompt.contains("4. Bottom-Right"));
    }

    #[test]
    fn prompt_is_deterministic_and_independent_of_resolution() {
        let one_k = build_character_prompt(&enfp_watercolor(ImageSize::OneK));
        let four_k = build_character_prompt(&enfp_watercolor(ImageSize::FourK));
        assert_eq!(one_k, four_k);
        assert_eq!(one_k, build_character_prompt(&enfp_watercolor(ImageSize::OneK)));
    }

    #[test]
    fn non_binary_is_spelled_out() {
        let request = GenerationRequest {
            gender: Gender::NonBinary,
            ..GenerationRequest::default()
        };
        assert!(build_character_prompt(&request).contains("Character Gender: Non-binary."));
    }
}
