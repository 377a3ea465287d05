mod archetypes;
mod axes;
mod styles;

pub use archetypes::{
    archetypes_in_group, default_archetype, find_archetype, Archetype, ArchetypeGroup, ARCHETYPES,
};
pub use axes::{Gender, ImageSize};
pub use styles::{default_style, find_style, ArtStyle, ART_STYLES};
