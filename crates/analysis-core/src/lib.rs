pub mod cancel;
pub mod error;
pub mod params;
pub mod processed;
pub mod result;
pub mod traits;
pub mod types;

pub use cancel::CancellationFlag;
pub use error::{AnalysisError, ProviderError};
pub use params::Parameters;
pub use processed::ProcessedData;
pub use result::{AnalysisResult, Confirmations, MultiTimeframeAnalysis, TimeframeAnalysis};
pub use traits::DataProvider;
pub use types::*;
