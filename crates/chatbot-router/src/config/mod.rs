pub mod settings;

pub use settings::{
    ClassifierConfig, ConversationConfig, IntentsConfig, LlmConfig, MatcherConfig, ServerConfig,
    Settings, SettingsError,
};
