//! Dialogue production: parsing, generation and fallback segmentation

pub mod converter;
pub mod fallback;
pub mod generator;
pub mod parser;
pub mod segment;

pub use converter::{convert_to_dialogue, MIN_ARTICLE_CHARS};
pub use fallback::rule_based_conversion;
pub use generator::{
    normalize_progress, read_load_events, GenerationRequest, GeneratorConfig, HttpGenerator,
    SharedLoad, TextGenerator,
};
pub use parser::{parse_dialogue, parse_dialogue_with, Label, LabelTable};
pub use segment::{correct_alternation, DialogueSegment, SpeakerId};
