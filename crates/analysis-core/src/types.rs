use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Absolute tolerance for floating-point equality and zero checks.
pub const EPSILON: f64 = 1e-9;

/// A single OHLC price row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// A single volume observation, aligned to price bars by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumePoint {
    pub timestamp: DateTime<Utc>,
    pub volume: f64,
}

/// Final signal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    Buy,
    Sell,
    NoAction,
}

/// Signal conviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStrength {
    Strong,
    Moderate,
    Neutral,
}

impl SignalStrength {
    /// Numeric score in [0, 1], used for confidence aggregation.
    pub fn to_score(&self) -> f64 {
        match self {
            SignalStrength::Strong => 1.0,
            SignalStrength::Moderate => 0.5,
            SignalStrength::Neutral => 0.0,
        }
    }
}

/// Volume classification relative to the trailing average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeClass {
    VeryHigh,
    High,
    Average,
    Low,
    VeryLow,
}

impl VolumeClass {
    /// Total order: VERY_LOW = 0 .. VERY_HIGH = 4.
    pub fn rank(&self) -> u8 {
        match self {
            VolumeClass::VeryLow => 0,
            VolumeClass::Low => 1,
            VolumeClass::Average => 2,
            VolumeClass::High => 3,
            VolumeClass::VeryHigh => 4,
        }
    }

    pub fn is_high(&self) -> bool {
        self.rank() >= VolumeClass::High.rank()
    }
}

/// Candle shape classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandleClass {
    Wide,
    Narrow,
    Wick,
    Neutral,
}

/// Local per-bar price direction over the processor lookback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceDirection {
    Up,
    Down,
    Sideways,
}

/// Graded trend direction over a lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Up,
    SlightUp,
    Sideways,
    SlightDown,
    Down,
}

impl TrendDirection {
    pub fn is_up(&self) -> bool {
        matches!(self, TrendDirection::Up | TrendDirection::SlightUp)
    }

    pub fn is_down(&self) -> bool {
        matches!(self, TrendDirection::Down | TrendDirection::SlightDown)
    }
}

/// Volume trend from the OBV slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeDirection {
    Increasing,
    Decreasing,
    Flat,
}

/// Price/volume relationship over a trend window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendSignal {
    TrendValidation,
    TrendAnomaly,
    Consolidation,
}

/// Directional bias attached to a trend reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendBias {
    Bullish,
    Bearish,
    Neutral,
}

/// Kind of a level test inside a pattern window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestKind {
    SupportTest,
    ResistanceTest,
}

/// Wyckoff event vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WyckoffEventKind {
    Ps,
    Sc,
    Ar,
    St,
    Spring,
    Test,
    Sos,
    Lps,
    Ut,
    Utad,
    Bc,
    Sow,
    Lpsy,
    Jac,
    AutoReaction,
}

/// Wyckoff phase labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WyckoffPhase {
    A,
    B,
    C,
    D,
    E,
}

/// Running market context maintained by the Wyckoff state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketContext {
    Undetermined,
    Downtrend,
    Accumulation,
    Uptrend,
    Distribution,
}

/// Kind of a Wyckoff trading range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RangeKind {
    Accumulation,
    Distribution,
}

/// Supported bar intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Daily,
}

impl Timeframe {
    /// Stable wire identifier, also used as the provider interval string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Min5 => "5m",
            Timeframe::Min15 => "15m",
            Timeframe::Min30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Daily => "1d",
        }
    }

    pub fn parse(s: &str) -> Option<Timeframe> {
        match s {
            "5m" => Some(Timeframe::Min5),
            "15m" => Some(Timeframe::Min15),
            "30m" => Some(Timeframe::Min30),
            "1h" => Some(Timeframe::Hour1),
            "4h" => Some(Timeframe::Hour4),
            "1d" => Some(Timeframe::Daily),
            _ => None,
        }
    }

    /// Duration represented by one bar.
    pub fn bar_duration(&self) -> Duration {
        match self {
            Timeframe::Min5 => Duration::minutes(5),
            Timeframe::Min15 => Duration::minutes(15),
            Timeframe::Min30 => Duration::minutes(30),
            Timeframe::Hour1 => Duration::hours(1),
            Timeframe::Hour4 => Duration::hours(4),
            Timeframe::Daily => Duration::days(1),
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much history to request from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchWindow {
    /// Trailing lookback such as "60d" or "7d"; interpreted by the provider.
    Lookback(String),
    /// Explicit date range, inclusive on both ends.
    Range { start: NaiveDate, end: NaiveDate },
}

/// One timeframe to fetch and analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeSpec {
    pub timeframe: Timeframe,
    pub window: FetchWindow,
}

impl TimeframeSpec {
    pub fn lookback(timeframe: Timeframe, period: &str) -> Self {
        Self {
            timeframe,
            window: FetchWindow::Lookback(period.to_string()),
        }
    }
}

/// Per-bar analysis verdict from the candle analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSignal {
    pub signal_type: SignalType,
    pub strength: SignalStrength,
    pub details: String,
}

/// Trend analysis over a lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    pub volume_trend: VolumeDirection,
    pub signal: TrendSignal,
    pub bias: TrendBias,
    /// Cumulative close-to-close change over the window.
    pub price_change_pct: f64,
    pub details: String,
}

/// One detected pattern with a graded strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub detected: bool,
    pub strength: u32,
    pub details: String,
}

impl PatternResult {
    pub fn not_detected(details: &str) -> Self {
        Self {
            detected: false,
            strength: 0,
            details: details.to_string(),
        }
    }
}

/// A support or resistance touch inside the pattern window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: TestKind,
    pub price: f64,
}

/// Level-testing activity inside the pattern window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestingResult {
    pub detected: bool,
    pub strength: u32,
    pub tests: Vec<TestEvent>,
    pub details: String,
}

/// All window-based pattern detections for one timeframe. Accumulation and
/// distribution may both be set; consumers use them independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub accumulation: PatternResult,
    pub distribution: PatternResult,
    pub testing: TestingResult,
    pub buying_climax: PatternResult,
    pub selling_climax: PatternResult,
}

/// A clustered pivot level weighted by traded volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    /// Summed volume of the bars contributing pivots to this level.
    pub volume: f64,
    pub last_touched: DateTime<Utc>,
}

/// Ranked support and resistance levels around the current price.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SupportResistanceAnalysis {
    pub support: Vec<PriceLevel>,
    pub resistance: Vec<PriceLevel>,
}

impl SupportResistanceAnalysis {
    /// Closest support strictly below `price`.
    pub fn nearest_support_below(&self, price: f64) -> Option<&PriceLevel> {
        self.support
            .iter()
            .filter(|l| l.price < price)
            .max_by(|a, b| a.price.total_cmp(&b.price))
    }

    /// Closest resistance strictly above `price`.
    pub fn nearest_resistance_above(&self, price: f64) -> Option<&PriceLevel> {
        self.resistance
            .iter()
            .filter(|l| l.price > price)
            .min_by(|a, b| a.price.total_cmp(&b.price))
    }

    /// (level, summed volume) pairs across both sides.
    pub fn volume_at_levels(&self) -> Vec<(f64, f64)> {
        self.support
            .iter()
            .chain(self.resistance.iter())
            .map(|l| (l.price, l.volume))
            .collect()
    }
}

/// Consolidated multi-timeframe signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub strength: SignalStrength,
    pub details: String,
    /// Per-timeframe excerpts, confirmations and confidence score.
    pub evidence: serde_json::Value,
}

impl Signal {
    pub fn no_action(details: impl Into<String>) -> Self {
        Self {
            signal_type: SignalType::NoAction,
            strength: SignalStrength::Neutral,
            details: details.into(),
            evidence: serde_json::Value::Null,
        }
    }
}

/// Stop, target and sizing derived from a BUY/SELL signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward_ratio: f64,
    /// Whole shares, floored, never negative.
    pub position_size: f64,
    pub risk_per_share: f64,
}

/// One detected Wyckoff event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WyckoffEventRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: WyckoffEventKind,
    pub price: f64,
    pub volume: f64,
}

/// A trading range; `end = None` means the range is still ongoing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingRange {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub kind: RangeKind,
    pub support: f64,
    pub resistance: f64,
}

/// A Wyckoff phase interval; `end = None` means the phase is still open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub phase: WyckoffPhase,
}

/// Full output of one Wyckoff run over one timeframe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WyckoffAnalysis {
    pub events: Vec<WyckoffEventRecord>,
    pub trading_ranges: Vec<TradingRange>,
    pub phases: Vec<PhaseRecord>,
    pub final_context: MarketContext,
}

impl Default for MarketContext {
    fn default() -> Self {
        MarketContext::Undetermined
    }
}
