//! Progress computation and throttled rendering for transfers.

use crate::utils::{format_duration, human_readable_bytes};
use std::fmt;
use std::time::{Duration, Instant};

/// Number of cells in the rendered progress bar.
pub const PROGRESS_BAR_WIDTH: usize = 10;
/// Minimum time between two emitted progress updates.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

const FILLED_CELL: char = '●';
const EMPTY_CELL: char = '○';

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Remote object fetched to local storage
    Download,
    /// Local file pushed to the chat platform
    Upload,
}

impl Direction {
    /// Status word shown in progress messages.
    #[must_use]
    pub const fn status_label(self) -> &'static str {
        match self {
            Self::Download => "Downloading",
            Self::Upload => "Uploading",
        }
    }

    /// Verb used in user-facing reports.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Per-transfer progress counters.
///
/// `last_emitted_at` only moves when an update is actually emitted, which is
/// what bounds the outbound notification rate.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Bytes moved so far
    pub bytes_transferred: u64,
    /// Expected total size in bytes
    pub total_bytes: u64,
    /// When the transfer started
    pub start_time: Instant,
    /// When the last update was emitted, if any
    pub last_emitted_at: Option<Instant>,
}

impl ProgressState {
    /// Create a state for a transfer starting now.
    #[must_use]
    pub fn new(total_bytes: u64) -> Self {
        Self::started_at(total_bytes, Instant::now())
    }

    /// Create a state for a transfer that started at `start_time`.
    #[must_use]
    pub const fn started_at(total_bytes: u64, start_time: Instant) -> Self {
        Self {
            bytes_transferred: 0,
            total_bytes,
            start_time,
            last_emitted_at: None,
        }
    }
}

/// Derived transfer figures, always finite and non-negative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferMetrics {
    /// Completed fraction in `0.0..=1.0`
    pub percent: f64,
    /// Average throughput in bytes per second
    pub speed: f64,
    /// Estimated time to completion
    pub eta: Duration,
}

/// Compute percent, speed and ETA from raw counters.
///
/// A zero `total` yields zero percent and a zero `elapsed` yields zero speed
/// and ETA; neither is treated as a fault.
#[must_use]
pub fn compute_metrics(current: u64, total: u64, elapsed: Duration) -> TransferMetrics {
    let percent = if total == 0 {
        0.0
    } else {
        (current as f64 / total as f64).clamp(0.0, 1.0)
    };

    let elapsed_secs = elapsed.as_secs_f64();
    let speed = if elapsed_secs > 0.0 {
        current as f64 / elapsed_secs
    } else {
        0.0
    };

    let eta = if speed > 0.0 {
        let remaining = total.saturating_sub(current) as f64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let secs = (remaining / speed).round() as u64;
        Duration::from_secs(secs)
    } else {
        Duration::ZERO
    };

    TransferMetrics {
        percent,
        speed,
        eta,
    }
}

/// Render the fixed-width bar for a completed fraction.
#[must_use]
pub fn progress_bar(percent: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = ((percent.clamp(0.0, 1.0) * PROGRESS_BAR_WIDTH as f64).round() as usize)
        .min(PROGRESS_BAR_WIDTH);

    let mut bar = FILLED_CELL.to_string().repeat(filled);
    bar.push_str(&EMPTY_CELL.to_string().repeat(PROGRESS_BAR_WIDTH - filled));
    bar
}

/// A progress update that passed the emission gate
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedUpdate {
    /// Telegram-ready HTML text
    pub text: String,
    /// Figures the text was rendered from
    pub metrics: TransferMetrics,
}

/// Turns raw byte counters into throttled, human-readable updates
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    direction: Direction,
    file_name: String,
    interval: Duration,
}

impl ProgressReporter {
    /// Create a reporter for one transfer with the default interval.
    #[must_use]
    pub fn new(direction: Direction, file_name: impl Into<String>) -> Self {
        Self {
            direction,
            file_name: file_name.into(),
            interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Override the minimum time between emitted updates.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Record a progress tick and return an update if the gate is open.
    pub fn on_progress(
        &self,
        current: u64,
        total: u64,
        state: &mut ProgressState,
    ) -> Option<RenderedUpdate> {
        self.on_progress_at(current, total, state, Instant::now())
    }

    /// Same as [`Self::on_progress`] with an explicit clock reading.
    pub fn on_progress_at(
        &self,
        current: u64,
        total: u64,
        state: &mut ProgressState,
        now: Instant,
    ) -> Option<RenderedUpdate> {
        state.bytes_transferred = current;
        state.total_bytes = total;

        if let Some(last) = state.last_emitted_at {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }

        let metrics = compute_metrics(
            current,
            total,
            now.saturating_duration_since(state.start_time),
        );
        state.last_emitted_at = Some(now);

        Some(RenderedUpdate {
            text: self.render(current, total, &metrics),
            metrics,
        })
    }

    fn render(&self, current: u64, total: u64, metrics: &TransferMetrics) -> String {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let percent = (metrics.percent * 100.0).round() as u64;

        format!(
            "<code>{name}</code>\nStatus: <b>{status}</b>\nProgress: [{bar}] {percent}%\n<i>{current} of {total} @ {speed}\nETA - {eta}</i>",
            name = html_escape::encode_text(&self.file_name),
            status = self.direction.status_label(),
            bar = progress_bar(metrics.percent),
            current = human_readable_bytes(current as f64, ""),
            total = human_readable_bytes(total as f64, ""),
            speed = human_readable_bytes(metrics.speed, "/s"),
            eta = format_duration(metrics.eta),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_is_zero_percent() {
        let metrics = compute_metrics(0, 0, Duration::from_secs(3));
        assert!(metrics.percent.abs() < f64::EPSILON);
        assert!(metrics.speed.abs() < f64::EPSILON);
        assert_eq!(metrics.eta, Duration::ZERO);
    }

    #[test]
    fn zero_elapsed_has_zero_speed_and_eta() {
        let metrics = compute_metrics(512, 1024, Duration::ZERO);
        assert!((metrics.percent - 0.5).abs() < f64::EPSILON);
        assert!(metrics.speed.abs() < f64::EPSILON);
        assert_eq!(metrics.eta, Duration::ZERO);
    }

    #[test]
    fn speed_and_eta_from_elapsed() {
        let metrics = compute_metrics(300, 1000, Duration::from_secs(3));
        assert!((metrics.speed - 100.0).abs() < 1e-9);
        assert_eq!(metrics.eta, Duration::from_secs(7));
    }

    #[test]
    fn overshoot_is_clamped() {
        let metrics = compute_metrics(2000, 1000, Duration::from_secs(1));
        assert!((metrics.percent - 1.0).abs() < f64::EPSILON);
        assert_eq!(metrics.eta, Duration::ZERO);
    }

    #[test]
    fn bar_is_always_ten_cells() {
        for step in 0..=200 {
            let percent = f64::from(step) / 100.0;
            assert_eq!(progress_bar(percent).chars().count(), PROGRESS_BAR_WIDTH);
        }
        assert_eq!(progress_bar(0.0), "○○○○○○○○○○");
        assert_eq!(progress_bar(0.34), "●●●○○○○○○○");
        assert_eq!(progress_bar(0.96), "●●●●●●●●●●");
    }

    #[test]
    fn first_tick_always_emits() {
        let start = Instant::now();
        let reporter = ProgressReporter::new(Direction::Download, "a.bin");
        let mut state = ProgressState::started_at(100, start);

        let update = reporter.on_progress_at(0, 100, &mut state, start);
        assert!(update.is_some());
        assert_eq!(state.last_emitted_at, Some(start));
    }

    #[test]
    fn gate_blocks_until_interval_elapsed() {
        let start = Instant::now();
        let reporter = ProgressReporter::new(Direction::Download, "a.bin");
        let mut state = ProgressState::started_at(100, start);

        assert!(reporter.on_progress_at(10, 100, &mut state, start).is_some());
        for ms in [1, 100, 2_500, 4_999] {
            let now = start + Duration::from_millis(ms);
            assert!(reporter.on_progress_at(20, 100, &mut state, now).is_none());
            assert_eq!(state.last_emitted_at, Some(start));
        }
        assert_eq!(state.bytes_transferred, 20);

        let later = start + Duration::from_secs(5);
        assert!(reporter.on_progress_at(30, 100, &mut state, later).is_some());
        assert_eq!(state.last_emitted_at, Some(later));
    }

    #[test]
    fn renders_upload_message() {
        let start = Instant::now();
        let reporter = ProgressReporter::new(Direction::Upload, "clip <1>.mp4");
        let mut state = ProgressState::started_at(4096, start);

        let update = reporter
            .on_progress_at(1024, 4096, &mut state, start + Duration::from_secs(2))
            .map(|u| u.text);
        let Some(text) = update else {
            panic!("expected an update");
        };

        assert!(text.contains("<code>clip &lt;1&gt;.mp4</code>"));
        assert!(text.contains("Status: <b>Uploading</b>"));
        assert!(text.contains("Progress: [●●●○○○○○○○] 25%"));
        assert!(text.contains("1.00 KB of 4.00 KB @ 512.00 B/s"));
        assert!(text.contains("ETA - 6s"));
    }
}
