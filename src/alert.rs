use std::{
    fmt,
    io::{self, Write},
    str::FromStr,
    thread,
};

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, TrySendError, bounded};

use crate::proximity::ProximityReading;

#[cfg(windows)]
const BEEP_FREQUENCY_HZ: u32 = 1_000;
#[cfg(windows)]
const BEEP_DURATION_MS: u32 = 100;

/// Something that tells the user a hand is too close.
pub trait AlertSink: Send + 'static {
    fn name(&self) -> &'static str;
    fn notify(&mut self, reading: &ProximityReading) -> Result<()>;
}

pub struct SilentSink;

impl AlertSink for SilentSink {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn notify(&mut self, _reading: &ProximityReading) -> Result<()> {
        Ok(())
    }
}

pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn notify(&mut self, reading: &ProximityReading) -> Result<()> {
        match reading.distance {
            Some(distance) => log::info!("hand detected at {distance:.2} cm, proximity alert"),
            None => log::info!("proximity alert"),
        }
        Ok(())
    }
}

/// Rings the terminal bell.
pub struct BellSink<W: Write + Send + 'static = io::Stdout> {
    out: W,
}

impl BellSink {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send + 'static> BellSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send + 'static> AlertSink for BellSink<W> {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn notify(&mut self, _reading: &ProximityReading) -> Result<()> {
        self.out
            .write_all(b"\x07")
            .and_then(|_| self.out.flush())
            .context("failed to ring terminal bell")
    }
}

#[cfg(windows)]
pub struct BeepSink;

#[cfg(windows)]
impl AlertSink for BeepSink {
    fn name(&self) -> &'static str {
        "beep"
    }

    fn notify(&mut self, _reading: &ProximityReading) -> Result<()> {
        use windows::Win32::System::Diagnostics::Debug::Beep;

        // Blocks for the duration of the tone.
        unsafe { Beep(BEEP_FREQUENCY_HZ, BEEP_DURATION_MS) }.context("Beep failed")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Auto,
    Silent,
    Log,
    Bell,
    Beep,
}

impl AlertKind {
    pub const VARIANTS: &'static [&'static str] = &["auto", "silent", "log", "bell", "beep"];

    pub fn build(self) -> Result<Box<dyn AlertSink>> {
        match self {
            AlertKind::Auto => Ok(platform_sink()),
            AlertKind::Silent => Ok(Box::new(SilentSink)),
            AlertKind::Log => Ok(Box::new(LogSink)),
            AlertKind::Bell => Ok(Box::new(BellSink::stdout())),
            #[cfg(windows)]
            AlertKind::Beep => Ok(Box::new(BeepSink)),
            #[cfg(not(windows))]
            AlertKind::Beep => Err(anyhow::anyhow!(
                "beep alerts are only available on Windows; use bell or log"
            )),
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertKind::Auto => "auto",
            AlertKind::Silent => "silent",
            AlertKind::Log => "log",
            AlertKind::Bell => "bell",
            AlertKind::Beep => "beep",
        };
        f.write_str(name)
    }
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(AlertKind::Auto),
            "silent" | "none" => Ok(AlertKind::Silent),
            "log" => Ok(AlertKind::Log),
            "bell" => Ok(AlertKind::Bell),
            "beep" => Ok(AlertKind::Beep),
            other => Err(format!(
                "unknown alert kind `{other}` (expected one of {})",
                Self::VARIANTS.join(", ")
            )),
        }
    }
}

#[cfg(windows)]
fn platform_sink() -> Box<dyn AlertSink> {
    Box::new(BeepSink)
}

#[cfg(not(windows))]
fn platform_sink() -> Box<dyn AlertSink> {
    Box::new(BellSink::stdout())
}

/// Runs a sink on its own thread so a blocking tone never stalls recognition.
///
/// Alerts that arrive while the sink is still busy are dropped.
#[derive(Clone, Debug)]
pub struct AlertDispatcher {
    tx: Sender<ProximityReading>,
}

impl AlertDispatcher {
    pub fn spawn(sink: Box<dyn AlertSink>) -> (Self, thread::JoinHandle<()>) {
        let (tx, rx) = bounded::<ProximityReading>(1);
        let handle = thread::spawn(move || {
            let mut sink = sink;
            log::info!("alert sink ready: {}", sink.name());
            while let Ok(reading) = rx.recv() {
                if let Err(err) = sink.notify(&reading) {
                    log::error!("could not play {} alert: {err:?}", sink.name());
                }
            }
        });
        (Self { tx }, handle)
    }

    /// Hands the reading to the sink if it is alerting. Returns whether it was queued.
    pub fn dispatch(&self, reading: &ProximityReading) -> bool {
        if !reading.alert {
            return false;
        }
        match self.tx.try_send(*reading) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("alert worker is gone, dropping alert");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use crossbeam_channel::{Receiver, unbounded};

    use super::*;

    fn alerting() -> ProximityReading {
        ProximityReading {
            pixel_width: 250.0,
            distance: Some(16.0),
            alert: true,
        }
    }

    struct RecordingSink {
        seen: Sender<ProximityReading>,
        gate: Receiver<()>,
    }

    impl AlertSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn notify(&mut self, reading: &ProximityReading) -> Result<()> {
            let _ = self.seen.send(*reading);
            let _ = self.gate.recv();
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn bell_writes_bel_character() {
        let buf = SharedBuf::default();
        let mut sink = BellSink::new(buf.clone());
        sink.notify(&alerting()).unwrap();
        assert_eq!(buf.0.lock().unwrap().as_slice(), b"\x07");
    }

    #[test]
    fn quiet_readings_are_not_dispatched() {
        let (dispatcher, _handle) = AlertDispatcher::spawn(Box::new(SilentSink));
        let reading = ProximityReading {
            pixel_width: 20.0,
            distance: Some(200.0),
            alert: false,
        };
        assert!(!dispatcher.dispatch(&reading));
    }

    #[test]
    fn busy_sink_drops_extra_alerts() {
        let (seen_tx, seen_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let sink = RecordingSink {
            seen: seen_tx,
            gate: gate_rx,
        };
        let (dispatcher, handle) = AlertDispatcher::spawn(Box::new(sink));

        assert!(dispatcher.dispatch(&alerting()));
        // The worker is now blocked inside notify.
        seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert!(dispatcher.dispatch(&alerting()));
        assert!(!dispatcher.dispatch(&alerting()));

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        drop(dispatcher);
        handle.join().unwrap();
        assert!(seen_rx.try_recv().is_err());
    }

    #[test]
    fn alert_kind_parses_case_insensitively() {
        assert_eq!("Bell".parse::<AlertKind>().unwrap(), AlertKind::Bell);
        assert_eq!("none".parse::<AlertKind>().unwrap(), AlertKind::Silent);
        assert!("siren".parse::<AlertKind>().is_err());
        assert_eq!(AlertKind::Log.to_string(), "log");
    }

    #[cfg(not(windows))]
    #[test]
    fn beep_is_windows_only() {
        assert!(AlertKind::Beep.build().is_err());
        assert_eq!(AlertKind::Auto.build().unwrap().name(), "bell");
    }
}
