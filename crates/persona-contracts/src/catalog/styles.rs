#[derive(Debug, PartialEq, Eq)]
pub struct ArtStyle {
    pub id: &'static str,
    pub name: &'static str,
    /// Inserted verbatim into the generation prompt.
    pub prompt_modifier: &'static str,
}

pub static ART_STYLES: [ArtStyle; 8] = [
    ArtStyle {
        id: "anime",
        name: "Anime",
        prompt_modifier: "Modern anime style, cel shading, vibrant colors, expressive eyes, clean line art",
    },
    ArtStyle {
        id: "watercolor",
        name: "Watercolor",
        prompt_modifier: "Soft watercolor painting, gentle color bleeds, textured paper, delicate brush strokes",
    },
    ArtStyle {
        id: "cyberpunk",
        name: "Cyberpunk",
        prompt_modifier: "Cyberpunk aesthetic, neon lighting, futuristic city backdrop, high-tech fashion, moody atmosphere",
    },
    ArtStyle {
        id: "pixel",
        name: "Pixel Art",
        prompt_modifier: "16-bit pixel art, limited palette, crisp pixels, retro video game sprite look",
    },
    ArtStyle {
        id: "oil",
        name: "Oil Painting",
        prompt_modifier: "Classical oil painting, rich textures, dramatic chiaroscuro lighting, museum quality",
    },
    ArtStyle {
        id: "3d",
        name: "3D Render",
        prompt_modifier: "Stylized 3D render, soft global illumination, animated feature film look, subsurface scattering",
    },
    ArtStyle {
        id: "comic",
        name: "Comic Book",
        prompt_modifier: "Western comic book style, bold ink outlines, halftone shading, dynamic panel energy",
    },
    ArtStyle {
        id: "sketch",
        name: "Pencil Sketch",
        prompt_modifier: "Graphite pencil sketch, cross-hatching, loose construction lines, monochrome",
    },
];

pub fn default_style() -> &'static ArtStyle {
    &ART_STYLES[0]
}

pub fn find_style(id: &str) -> Option<&'static ArtStyle> {
    let needle = id.trim();
    ART_STYLES
        .iter()
        .find(|style| style.id.eq_ignore_ascii_case(needle))
}
