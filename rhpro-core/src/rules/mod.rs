// Heading detection and title mapping stages.
// - section_detection.rs: HeadingDetector implementations and the Segmenter
// - title_mapping.rs: TitleMapper matching cascade (exact, contains, regex, fuzzy)

pub mod section_detection;
pub mod title_mapping;

pub use section_detection::{HeadingDetector, Segmenter};
pub use title_mapping::{TitleMapper, TitleMatch};
