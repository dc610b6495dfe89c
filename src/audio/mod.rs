pub mod codec;
pub mod host;
pub mod playback;
pub mod processor;
pub mod recorder;
pub mod resample;
pub mod segment;
