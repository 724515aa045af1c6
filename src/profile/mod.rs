pub mod builder;
pub mod segment;
pub mod types;

pub use builder::VoiceProfileBuilder;
pub use segment::{SampleSource, SegmentationPipeline};
pub use types::{
    ProfileQuality, Register, SignaturePatterns, ToneProfile, VoiceProfile, WritingSample,
};
