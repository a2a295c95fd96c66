pub mod bundles;
pub mod configs;
pub mod dialogues;
pub mod pipeline;
pub mod prompts;
pub mod renderers;
pub mod translators;
