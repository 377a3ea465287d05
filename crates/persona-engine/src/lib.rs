pub mod config;
pub mod key_gate;
pub mod prompt;
pub mod providers;
pub mod studio;

pub use config::EngineConfig;
pub use key_gate::{CredentialSlot, HostKeyCapability, KeyGate, KeyGateCheck};
pub use prompt::build_character_prompt;
pub use providers::{
    DryrunProvider, GeminiProvider, ImageGenerator, ImageGeneratorRegistry,
    ProviderGenerateRequest, ProviderGenerateResponse,
};
pub use studio::{default_generators, CompletedGeneration, GenerationJob, SessionCounters, Studio};
