use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{FetchWindow, PriceBar, Timeframe, VolumePoint};

/// Capability the engine consumes to obtain bar data. Implementations may
/// block on I/O or run as cooperative tasks; this is the engine's only
/// suspension point.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(
        &self,
        ticker: &str,
        timeframe: Timeframe,
        window: &FetchWindow,
    ) -> Result<(Vec<PriceBar>, Vec<VolumePoint>), ProviderError>;
}
