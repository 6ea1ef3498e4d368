pub mod decode;
pub mod driver;
pub mod spectrum;
pub mod transport;

pub use decode::{AudioSource, DecodeError, SourceInfo};
pub use driver::{DriverState, SpectrumUpdateDriver};
pub use spectrum::{SpectrumAnalyzer, SpectrumConfig};
pub use transport::{ClockTransport, PlaybackTransport};
