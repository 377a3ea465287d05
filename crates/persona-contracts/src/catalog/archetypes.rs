use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchetypeGroup {
    Analysts,
    Diplomats,
    Sentinels,
    Explorers,
}

impl ArchetypeGroup {
    pub const ALL: [ArchetypeGroup; 4] = [
        ArchetypeGroup::Analysts,
        ArchetypeGroup::Diplomats,
        ArchetypeGroup::Sentinels,
        ArchetypeGroup::Explorers,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Analysts => "Analysts",
            Self::Diplomats => "Diplomats",
            Self::Sentinels => "Sentinels",
            Self::Explorers => "Explorers",
        }
    }
}

impl fmt::Display for ArchetypeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One of the sixteen personality archetypes.
///
/// Entries live in [`ARCHETYPES`] for the lifetime of the process and are
/// always handed around as `&'static Archetype`, so a selection can never
/// point outside the catalog.
#[derive(Debug, PartialEq, Eq)]
pub struct Archetype {
    pub code: &'static str,
    pub name: &'static str,
    pub group: ArchetypeGroup,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
    pub color: &'static str,
    pub gradient: &'static str,
}

pub static ARCHETYPES: [Archetype; 16] = [
    Archetype {
        code: "INTJ",
        name: "Architect",
        group: ArchetypeGroup::Analysts,
        description: "Imaginative and strategic thinkers, with a plan for everything.",
        keywords: &["Strategic", "Independent", "Visionary", "Determined"],
        color: "purple",
        gradient: "purple-indigo",
    },
    Archetype {
        code: "INTP",
        name: "Logician",
        group: ArchetypeGroup::Analysts,
        description: "Innovative inventors with an unquenchable thirst for knowledge.",
        keywords: &["Analytical", "Curious", "Abstract", "Inventive"],
        color: "purple",
        gradient: "violet-purple",
    },
    Archetype {
        code: "ENTJ",
        name: "Commander",
        group: ArchetypeGroup::Analysts,
        description: "Bold, imaginative and strong-willed leaders, always finding a way or making one.",
        keywords: &["Decisive", "Ambitious", "Commanding", "Efficient"],
        color: "purple",
        gradient: "fuchsia-purple",
    },
    Archetype {
        code: "ENTP",
        name: "Debater",
        group: ArchetypeGroup::Analysts,
        description: "Smart and curious thinkers who cannot resist an intellectual challenge.",
        keywords: &["Quick-witted", "Inventive", "Provocative", "Energetic"],
        color: "purple",
        gradient: "purple-pink",
    },
    Archetype {
        code: "INFJ",
        name: "Advocate",
        group: ArchetypeGroup::Diplomats,
        description: "Quiet and mystical, yet very inspiring and tireless idealists.",
        keywords: &["Insightful", "Principled", "Compassionate", "Mysterious"],
        color: "green",
        gradient: "emerald-green",
    },
    Archetype {
        code: "INFP",
        name: "Mediator",
        group: ArchetypeGroup::Diplomats,
        description: "Poetic, kind and altruistic people, always eager to help a good cause.",
        keywords: &["Idealistic", "Empathetic", "Creative", "Dreamy"],
        color: "green",
        gradient: "green-teal",
    },
    Archetype {
        code: "ENFJ",
        name: "Protagonist",
        group: ArchetypeGroup::Diplomats,
        description: "Charismatic and inspiring leaders, able to mesmerize their listeners.",
        keywords: &["Charismatic", "Inspiring", "Altruistic", "Warm"],
        color: "green",
        gradient: "teal-emerald",
    },
    Archetype {
        code: "ENFP",
        name: "Campaigner",
        group: ArchetypeGroup::Diplomats,
        description: "Enthusiastic, creative and sociable free spirits, who can always find a reason to smile.",
        keywords: &["Enthusiastic", "Creative", "Sociable", "Free-spirited"],
        color: "green",
        gradient: "lime-green",
    },
    Archetype {
        code: "ISTJ",
        name: "Logistician",
        group: ArchetypeGroup::Sentinels,
        description: "Practical and fact-minded individuals, whose reliability cannot be doubted.",
        keywords: &["Responsible", "Methodical", "Reliable", "Orderly"],
        color: "blue",
        gradient: "blue-sky",
    },
    Archetype {
        code: "ISFJ",
        name: "Defender",
        group: ArchetypeGroup::Sentinels,
        description: "Very dedicated and warm protectors, always ready to defend their loved ones.",
        keywords: &["Supportive", "Loyal", "Patient", "Observant"],
        color: "blue",
        gradient: "sky-cyan",
    },
    Archetype {
        code: "ESTJ",
        name: "Executive",
        group: ArchetypeGroup::Sentinels,
        description: "Excellent administrators, unsurpassed at managing things or people.",
        keywords: &["Organized", "Direct", "Traditional", "Dependable"],
        color: "blue",
        gradient: "indigo-blue",
    },
    Archetype {
        code: "ESFJ",
        name: "Consul",
        group: ArchetypeGroup::Sentinels,
        description: "Extraordinarily caring, social and popular people, always eager to help.",
        keywords: &["Caring", "Sociable", "Harmonious", "Attentive"],
        color: "blue",
        gradient: "cyan-blue",
    },
    Archetype {
        code: "ISTP",
        name: "Virtuoso",
        group: ArchetypeGroup::Explorers,
        description: "Bold and practical experimenters, masters of all kinds of tools.",
        keywords: &["Hands-on", "Calm", "Adaptable", "Resourceful"],
        color: "yellow",
        gradient: "amber-yellow",
    },
    Archetype {
        code: "ISFP",
        name: "Adventurer",
        group: ArchetypeGroup::Explorers,
        description: "Flexible and charming artists, always ready to explore and experience something new.",
        keywords: &["Artistic", "Gentle", "Spontaneous", "Sensitive"],
        color: "yellow",
        gradient: "yellow-orange",
    },
    Archetype {
        code: "ESTP",
        name: "Entrepreneur",
        group: ArchetypeGroup::Explorers,
        description: "Smart, energetic and very perceptive people, who truly enjoy living on the edge.",
        keywords: &["Daring", "Energetic", "Perceptive", "Bold"],
        color: "yellow",
        gradient: "orange-amber",
    },
    Archetype {
        code: "ESFP",
        name: "Entertainer",
        group: ArchetypeGroup::Explorers,
        description: "Spontaneous, energetic and enthusiastic entertainers. Life is never boring around them.",
        keywords: &["Playful", "Vivacious", "Outgoing", "Fun-loving"],
        color: "yellow",
        gradient: "orange-red",
    },
];

pub fn default_archetype() -> &'static Archetype {
    &ARCHETYPES[0]
}

pub fn find_archetype(code: &str) -> Option<&'static Archetype> {
    let needle = code.trim();
    ARCHETYPES
        .iter()
        .find(|archetype| archetype.code.eq_ignore_ascii_case(needle))
}

pub fn archetypes_in_group(group: ArchetypeGroup) -> impl Iterator<Item = &'static Archetype> {
    ARCHETYPES
        .iter()
        .filter(move |archetype| archetype.group == group)
}
