//! Wyckoff event, trading-range and phase detection.
//!
//! A per-run state machine walks the processed bundle bar by bar. Swing
//! highs/lows are confirmed `swing_n` bars after they form; climactic
//! events hang off confirmed swings while springs, upthrusts, breakouts
//! and their retests are recognized on the bar where they happen. Ranges
//! open on a climax/reaction pair and close on a confirmed sign of
//! strength or weakness, which also advances the running market context.

use std::sync::Arc;

use analysis_core::types::{
    MarketContext, PhaseRecord, RangeKind, TradingRange, WyckoffAnalysis, WyckoffEventKind,
    WyckoffEventRecord, WyckoffPhase, EPSILON,
};
use analysis_core::{AnalysisError, Parameters, ProcessedData};
use chrono::{DateTime, Utc};
use vpa_engine::rolling::{is_pivot_high, is_pivot_low, rolling_mean};

#[derive(Debug)]
pub struct WyckoffAnalyzer {
    params: Arc<Parameters>,
}

impl WyckoffAnalyzer {
    pub fn new(params: Arc<Parameters>) -> Self {
        Self { params }
    }

    /// Run the state machine over one timeframe's processed bundle. Never
    /// fails on "no pattern": an empty result set is a valid outcome.
    pub fn analyze(&self, data: &ProcessedData) -> Result<WyckoffAnalysis, AnalysisError> {
        let p = self.params.as_ref();
        let n = data.len();
        let min_bars = p.vol_lookback + p.swing_n;
        if n < min_bars {
            return Err(AnalysisError::InsufficientData(format!(
                "wyckoff analysis needs at least {min_bars} bars, got {n}"
            )));
        }

        let dynamics = Dynamics::compute(data, p.vol_lookback);
        let mut machine = Machine::new(p, data, &dynamics);
        for t in 0..n {
            machine.step(t);
        }
        Ok(machine.finish())
    }
}

/// Precomputed market dynamics: volume and bar-range spike ratios against
/// their rolling means. Warmup slots are NaN, which makes every spike
/// comparison false until the lookback fills.
struct Dynamics {
    vol_spike: Vec<f64>,
    range_spike: Vec<f64>,
}

impl Dynamics {
    fn compute(data: &ProcessedData, lookback: usize) -> Self {
        let n = data.len();
        let range: Vec<f64> = (0..n).map(|i| data.high[i] - data.low[i]).collect();
        let avg_volume = rolling_mean(&data.volume, lookback);
        let avg_range = rolling_mean(&range, lookback);

        let spike = |value: f64, avg: f64| {
            if avg.is_finite() && avg > EPSILON {
                value / avg
            } else {
                f64::NAN
            }
        };
        Self {
            vol_spike: (0..n)
                .map(|i| spike(data.volume[i], avg_volume[i]))
                .collect(),
            range_spike: (0..n).map(|i| spike(range[i], avg_range[i])).collect(),
        }
    }
}

/// A climactic swing awaiting its automatic rally / reaction.
struct PendingClimax {
    index: usize,
    kind: RangeKind,
    price: f64,
    volume: f64,
}

struct ActiveRange {
    kind: RangeKind,
    start_index: usize,
    support: f64,
    resistance: f64,
    climax_price: f64,
    climax_volume: f64,
    /// Spring or upthrust seen: the range is in its test phase.
    in_test_phase: bool,
    spring_index: Option<usize>,
    upthrust_index: Option<usize>,
    retest_seen: bool,
}

/// A closed range's broken level, awaiting LPS/LPSY.
struct Breakout {
    kind: RangeKind,
    level: f64,
    breakout_index: usize,
}

struct Machine<'a> {
    params: &'a Parameters,
    data: &'a ProcessedData,
    dynamics: &'a Dynamics,

    context: MarketContext,
    pending: Option<PendingClimax>,
    active: Option<ActiveRange>,
    breakout: Option<Breakout>,
    ps_index: Option<usize>,

    events: Vec<WyckoffEventRecord>,
    ranges: Vec<TradingRange>,
    phases: Vec<PhaseRecord>,
    open_phase: Option<(WyckoffPhase, DateTime<Utc>)>,
}

impl<'a> Machine<'a> {
    fn new(params: &'a Parameters, data: &'a ProcessedData, dynamics: &'a Dynamics) -> Self {
        Self {
            params,
            data,
            dynamics,
            context: MarketContext::Undetermined,
            pending: None,
            active: None,
            breakout: None,
            ps_index: None,
            events: Vec::new(),
            ranges: Vec::new(),
            phases: Vec::new(),
            open_phase: None,
        }
    }

    fn step(&mut self, t: usize) {
        self.expire_stale_state(t);
        if let Some(swing) = t.checked_sub(self.params.swing_n) {
            self.on_confirmed_swing(swing);
        }
        self.on_bar(t);
    }

    /// A climax whose rally never arrived stops being actionable, as does a
    /// preliminary support that no climax ever followed.
    fn expire_stale_state(&mut self, t: usize) {
        let p = self.params;
        let expired = self
            .pending
            .as_ref()
            .is_some_and(|pending| t > pending.index + p.ar_window + p.swing_n);
        if expired {
            self.pending = None;
            self.ps_index = None;
            self.close_phase(self.data.timestamps[t]);
        }

        let ps_stale = self.pending.is_none()
            && self.active.is_none()
            && self.ps_index.is_some_and(|ps| t > ps + p.ar_window);
        if ps_stale {
            self.ps_index = None;
        }
    }

    fn on_confirmed_swing(&mut self, s: usize) {
        let p = self.params;
        let data = self.data;
        let swing_low = is_pivot_low(&data.low, s, p.swing_n);
        let swing_high = is_pivot_high(&data.high, s, p.swing_n);
        if !swing_low && !swing_high {
            return;
        }

        // Automatic rally / reaction completes a pending climax.
        if let Some(pending) = self.pending.take() {
            let within = s > pending.index && s - pending.index <= p.ar_window;
            let completes = match pending.kind {
                RangeKind::Accumulation => swing_high && within,
                RangeKind::Distribution => swing_low && within,
            };
            if completes {
                self.open_range(pending, s);
                return;
            }
            self.pending = Some(pending);
            return;
        }

        // Secondary tests widen an active range.
        if let Some(active) = self.active.as_ref() {
            let band = p.test_band_pct * active.climax_price;
            match active.kind {
                RangeKind::Accumulation if swing_low => {
                    let near = (data.low[s] - active.climax_price).abs() <= band;
                    let not_spring = active.spring_index != Some(s);
                    if near && not_spring && data.volume[s] < active.climax_volume {
                        self.push_event(s, WyckoffEventKind::St, data.low[s]);
                        let active = self.active.as_mut().unwrap();
                        active.support = active.support.min(data.low[s]);
                    }
                }
                RangeKind::Distribution if swing_high => {
                    let near = (data.high[s] - active.climax_price).abs() <= band;
                    let not_upthrust = active.upthrust_index != Some(s);
                    if near && not_upthrust && data.volume[s] < active.climax_volume {
                        self.push_event(s, WyckoffEventKind::St, data.high[s]);
                        let active = self.active.as_mut().unwrap();
                        active.resistance = active.resistance.max(data.high[s]);
                    }
                }
                _ => {}
            }
            return;
        }

        // Climaxes only start a new structure outside any range.
        let climactic = self.dynamics.vol_spike[s] >= p.climax_vol_multiplier
            && self.dynamics.range_spike[s] >= p.climax_range_multiplier;
        if !climactic {
            return;
        }

        if swing_low
            && data.close[s] < data.open[s]
            && matches!(
                self.context,
                MarketContext::Undetermined | MarketContext::Downtrend
            )
        {
            self.push_event(s, WyckoffEventKind::Sc, data.low[s]);
            let phase_start = self.ps_index.unwrap_or(s);
            self.begin_phase(WyckoffPhase::A, data.timestamps[phase_start]);
            self.context = MarketContext::Accumulation;
            self.breakout = None;
            self.pending = Some(PendingClimax {
                index: s,
                kind: RangeKind::Accumulation,
                price: data.low[s],
                volume: data.volume[s],
            });
        } else if swing_high
            && data.close[s] > data.open[s]
            && self.context == MarketContext::Uptrend
        {
            self.push_event(s, WyckoffEventKind::Bc, data.high[s]);
            self.begin_phase(WyckoffPhase::A, data.timestamps[s]);
            self.context = MarketContext::Distribution;
            self.breakout = None;
            self.pending = Some(PendingClimax {
                index: s,
                kind: RangeKind::Distribution,
                price: data.high[s],
                volume: data.volume[s],
            });
        }
    }

    fn open_range(&mut self, pending: PendingClimax, reaction: usize) {
        let data = self.data;
        let (event, support, resistance, price) = match pending.kind {
            RangeKind::Accumulation => (
                WyckoffEventKind::Ar,
                pending.price,
                data.high[reaction],
                data.high[reaction],
            ),
            RangeKind::Distribution => (
                WyckoffEventKind::AutoReaction,
                data.low[reaction],
                pending.price,
                data.low[reaction],
            ),
        };
        if resistance <= support + EPSILON {
            return;
        }

        self.push_event(reaction, event, price);
        self.begin_phase(WyckoffPhase::B, data.timestamps[reaction]);
        self.active = Some(ActiveRange {
            kind: pending.kind,
            start_index: pending.index,
            support,
            resistance,
            climax_price: pending.price,
            climax_volume: pending.volume,
            in_test_phase: false,
            spring_index: None,
            upthrust_index: None,
            retest_seen: false,
        });
    }

    fn on_bar(&mut self, t: usize) {
        self.detect_preliminary_support(t);
        self.detect_spring_or_upthrust(t);
        self.detect_spring_retest(t);
        self.detect_breakout(t);
        self.detect_last_point(t);
    }

    /// High-volume down bar without climactic range expansion, ahead of any
    /// selling climax.
    fn detect_preliminary_support(&mut self, t: usize) {
        let p = self.params;
        let data = self.data;
        if self.ps_index.is_some()
            || self.pending.is_some()
            || self.active.is_some()
            || !matches!(
                self.context,
                MarketContext::Undetermined | MarketContext::Downtrend
            )
        {
            return;
        }
        if data.close[t] < data.open[t]
            && self.dynamics.vol_spike[t] >= p.climax_vol_multiplier
            && self.dynamics.range_spike[t] < p.climax_range_multiplier
        {
            self.push_event(t, WyckoffEventKind::Ps, data.low[t]);
            self.ps_index = Some(t);
        }
    }

    fn detect_spring_or_upthrust(&mut self, t: usize) {
        let p = self.params;
        let data = self.data;
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if self.dynamics.vol_spike[t] < p.spring_vol_multiplier {
            return;
        }

        match active.kind {
            RangeKind::Accumulation => {
                let pierced = data.low[t] < active.support
                    && active.support - data.low[t] <= p.spring_pct * active.support;
                let reclaimed = data.close[t] > active.support;
                if pierced && reclaimed && !active.in_test_phase {
                    self.push_event(t, WyckoffEventKind::Spring, data.low[t]);
                    self.begin_phase(WyckoffPhase::C, data.timestamps[t]);
                    let active = self.active.as_mut().unwrap();
                    active.in_test_phase = true;
                    active.spring_index = Some(t);
                }
            }
            RangeKind::Distribution => {
                let pierced = data.high[t] > active.resistance
                    && data.high[t] - active.resistance <= p.spring_pct * active.resistance;
                let rejected = data.close[t] < active.resistance;
                if pierced && rejected {
                    if active.in_test_phase {
                        self.push_event(t, WyckoffEventKind::Utad, data.high[t]);
                        self.active.as_mut().unwrap().upthrust_index = Some(t);
                    } else {
                        self.push_event(t, WyckoffEventKind::Ut, data.high[t]);
                        self.begin_phase(WyckoffPhase::C, data.timestamps[t]);
                        let active = self.active.as_mut().unwrap();
                        active.in_test_phase = true;
                        active.upthrust_index = Some(t);
                    }
                }
            }
        }
    }

    /// Low-volume hold of support after a spring.
    fn detect_spring_retest(&mut self, t: usize) {
        let p = self.params;
        let data = self.data;
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if active.kind != RangeKind::Accumulation || active.retest_seen {
            return;
        }
        let Some(spring) = active.spring_index else {
            return;
        };
        if t <= spring {
            return;
        }

        let holds = data.low[t] <= active.support * (1.0 + p.test_band_pct)
            && data.close[t] > active.support;
        if holds && self.dynamics.vol_spike[t] < 1.0 {
            self.push_event(t, WyckoffEventKind::Test, data.low[t]);
            self.active.as_mut().unwrap().retest_seen = true;
        }
    }

    fn detect_breakout(&mut self, t: usize) {
        let p = self.params;
        let data = self.data;
        let Some(active) = self.active.as_ref() else {
            return;
        };
        if t < active.start_index + p.range_min_length {
            return;
        }
        let energetic = self.dynamics.vol_spike[t] >= p.spring_vol_multiplier
            && self.dynamics.range_spike[t] >= 1.0;
        if !energetic {
            return;
        }

        let kind = active.kind;
        let support = active.support;
        let resistance = active.resistance;
        match kind {
            RangeKind::Accumulation
                if data.close[t] > resistance && data.close[t] > data.open[t] =>
            {
                self.push_event(t, WyckoffEventKind::Sos, data.close[t]);
                if (data.close[t] - resistance) / resistance >= p.jac_gap_pct {
                    self.push_event(t, WyckoffEventKind::Jac, data.close[t]);
                }
                self.begin_phase(WyckoffPhase::D, data.timestamps[t]);
                self.context = MarketContext::Uptrend;
                self.close_range(t);
                self.breakout = Some(Breakout {
                    kind,
                    level: resistance,
                    breakout_index: t,
                });
            }
            RangeKind::Distribution
                if data.close[t] < support && data.close[t] < data.open[t] =>
            {
                self.push_event(t, WyckoffEventKind::Sow, data.close[t]);
                self.begin_phase(WyckoffPhase::D, data.timestamps[t]);
                self.context = MarketContext::Downtrend;
                self.close_range(t);
                self.breakout = Some(Breakout {
                    kind,
                    level: support,
                    breakout_index: t,
                });
            }
            _ => {}
        }
    }

    /// First pullback after a breakout that holds the broken level.
    fn detect_last_point(&mut self, t: usize) {
        let p = self.params;
        let data = self.data;
        let Some(breakout) = self.breakout.as_ref() else {
            return;
        };
        if t <= breakout.breakout_index {
            return;
        }
        let level = breakout.level;

        match breakout.kind {
            RangeKind::Accumulation => {
                let holds = data.low[t] <= level * (1.0 + p.test_band_pct)
                    && data.close[t] >= level;
                if holds {
                    self.push_event(t, WyckoffEventKind::Lps, data.low[t]);
                    self.begin_phase(WyckoffPhase::E, data.timestamps[t]);
                    self.breakout = None;
                }
            }
            RangeKind::Distribution => {
                let holds = data.high[t] >= level * (1.0 - p.test_band_pct)
                    && data.close[t] <= level;
                if holds {
                    self.push_event(t, WyckoffEventKind::Lpsy, data.high[t]);
                    self.begin_phase(WyckoffPhase::E, data.timestamps[t]);
                    self.breakout = None;
                }
            }
        }
    }

    fn close_range(&mut self, t: usize) {
        if let Some(active) = self.active.take() {
            self.ranges.push(TradingRange {
                start: self.data.timestamps[active.start_index],
                end: Some(self.data.timestamps[t]),
                kind: active.kind,
                support: active.support,
                resistance: active.resistance,
            });
        }
        self.ps_index = None;
    }

    fn push_event(&mut self, index: usize, kind: WyckoffEventKind, price: f64) {
        self.events.push(WyckoffEventRecord {
            timestamp: self.data.timestamps[index],
            kind,
            price,
            volume: self.data.volume[index],
        });
    }

    fn begin_phase(&mut self, phase: WyckoffPhase, start: DateTime<Utc>) {
        self.close_phase(start);
        self.open_phase = Some((phase, start));
    }

    fn close_phase(&mut self, end: DateTime<Utc>) {
        if let Some((phase, start)) = self.open_phase.take() {
            self.phases.push(PhaseRecord {
                start,
                end: Some(end),
                phase,
            });
        }
    }

    fn finish(mut self) -> WyckoffAnalysis {
        if let Some(active) = self.active.take() {
            self.ranges.push(TradingRange {
                start: self.data.timestamps[active.start_index],
                end: None,
                kind: active.kind,
                support: active.support,
                resistance: active.resistance,
            });
        }
        if let Some((phase, start)) = self.open_phase.take() {
            self.phases.push(PhaseRecord {
                start,
                end: None,
                phase,
            });
        }
        // Swing-confirmed events surface swing_n bars late; restore
        // timestamp order for the emitted list.
        self.events.sort_by_key(|event| event.timestamp);

        WyckoffAnalysis {
            events: self.events,
            trading_ranges: self.ranges,
            phases: self.phases,
            final_context: self.context,
        }
    }
}

#[cfg(test)]
mod tests;
