pub mod candle;
pub mod patterns;
pub mod processor;
pub mod rolling;
pub mod support_resistance;
pub mod trend;

#[cfg(test)]
pub(crate) mod test_support;

pub use candle::CandleAnalyzer;
pub use patterns::PatternRecognizer;
pub use processor::Processor;
pub use support_resistance::SupportResistanceAnalyzer;
pub use trend::TrendAnalyzer;
