//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one tagged
//! line through the `log` facade (`env_logger` on the console in the
//! binary), and keeps the most recent events in a fixed ring for a status
//! display to pull.

use heapless::HistoryBuffer;
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Events kept for [`LogEventSink::recent`].
pub const HISTORY_LEN: usize = 40;

/// Adapter that logs every [`AppEvent`] and remembers the last few.
pub struct LogEventSink {
    history: HistoryBuffer<AppEvent, HISTORY_LEN>,
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self {
            history: HistoryBuffer::new(),
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &AppEvent> {
        self.history.oldest_ordered()
    }

    pub fn last(&self) -> Option<&AppEvent> {
        self.history.recent()
    }
}

/// One-line rendering with a fixed tag per event kind.
pub fn render(event: &AppEvent) -> String {
    match event {
        AppEvent::Started { setpoint } => format!("START | setpoint={setpoint:.3}"),
        AppEvent::Stopped => "STOP | servo off".to_string(),
        AppEvent::SetpointChanged(v) => format!("SETPOINT | {v:.3}"),
        AppEvent::GainsApplied { form, gains } => format!(
            "GAINS | {form} ({:.4}, {:.4}, {:.4})",
            gains.gain, gains.integral, gains.derivative
        ),
        AppEvent::AdvancedChanged(a) => format!(
            "GAINS | advanced aw={} df={} sw={} ff={} Tt={} N={} beta={} gamma={} Kff={}",
            a.anti_windup,
            a.derivative_filter,
            a.setpoint_weighting,
            a.feed_forward,
            a.tt,
            a.n,
            a.beta,
            a.gamma,
            a.kff
        ),
        AppEvent::ModeChanged { manual } => {
            format!("MODE | {}", if *manual { "manual" } else { "auto" })
        }
        AppEvent::AutotuneStarted(method) => format!("TUNE | start {method}"),
        AppEvent::AutotuneFinished(Ok(g)) => format!(
            "TUNE | Ku={:.4} Pu={:.3}s -> Kp={:.4} Ki={:.4} Kd={:.4}",
            g.ku, g.pu, g.kp, g.ki, g.kd
        ),
        AppEvent::AutotuneFinished(Err(reason)) => format!("TUNE | failed: {reason}"),
        AppEvent::AutotuneAborted(e) => format!("FAULT | autotune aborted: {e}"),
        AppEvent::Telemetry(s) => format!(
            "TELEM | {} | raw={} y={:.3} r={:.3} u={:.3} pulse={}us | P={:.3} I={:.3} D={:.3}{}{}",
            s.mode,
            s.raw,
            s.measurement,
            s.setpoint,
            s.output,
            s.pulse_us,
            s.p,
            s.i,
            s.d,
            if s.saturated { " SAT" } else { "" },
            if s.manual { " MANUAL" } else { "" },
        ),
        AppEvent::TickFailed(e) => format!("FAULT | tick: {e}"),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let line = render(event);
        match event {
            AppEvent::TickFailed(_) | AppEvent::AutotuneAborted(_) => warn!("{line}"),
            _ => info!("{line}"),
        }
        self.history.write(*event);
    }
}
