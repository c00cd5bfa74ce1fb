//! Simulated printer used by `snaplog record`.
//!
//! Answers reads from deterministic waveforms of the time since creation.
//! Inside a batch, reads are queued and served by one simulated round trip
//! when the batch closes; outside a batch each read costs its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;

use snaplog_core::{BatchQueue, BoxError, DeviceClient, Element, Producer, Reading};

/// One value the simulated device can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    NozzleTemp,
    BedTemp,
    FanSpeed,
    AxisX,
    AxisY,
    AxisZ,
    Status,
}

/// Channel names accepted in `device.channels` / `--channel`.
pub const CHANNELS: &[&str] = &["nozzle_temp", "bed_temp", "fan_speed", "position", "status"];

pub struct SimDevice {
    started: Instant,
    latency: Duration,
    queue: BatchQueue<Signal>,
    round_trips: AtomicU64,
}

impl SimDevice {
    pub fn new(latency: Duration) -> Self {
        Self {
            started: Instant::now(),
            latency,
            queue: BatchQueue::new(),
            round_trips: AtomicU64::new(0),
        }
    }

    /// Round trips made so far, batched or not.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    /// Read one signal: a placeholder inside a batch, a value outside.
    pub fn read(&self, signal: Signal) -> Element {
        match self.queue.enqueue(signal) {
            Ok(pending) => Element::Pending(pending),
            Err(signal) => {
                self.round_trip();
                Element::Ready(self.sample(signal))
            }
        }
    }

    fn round_trip(&self) {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }

    fn sample(&self, signal: Signal) -> Value {
        let t = self.started.elapsed().as_secs_f64();
        match signal {
            Signal::NozzleTemp => round2(210.0 + 2.5 * t.sin()).into(),
            Signal::BedTemp => round2(60.0 + 0.4 * (t / 3.0).sin()).into(),
            Signal::FanSpeed => (t * 10.0).rem_euclid(100.0).round().into(),
            Signal::AxisX => round2(100.0 + 40.0 * (t / 2.0).cos()).into(),
            Signal::AxisY => round2(100.0 + 40.0 * (t / 2.0).sin()).into(),
            Signal::AxisZ => round2(0.2 * (t / 5.0).floor()).into(),
            Signal::Status => Value::from("printing"),
        }
    }
}

impl std::fmt::Debug for SimDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDevice")
            .field("latency", &self.latency)
            .field("round_trips", &self.round_trips())
            .finish_non_exhaustive()
    }
}

impl DeviceClient for SimDevice {
    fn begin_batch(&self) -> Result<(), BoxError> {
        self.queue.begin()
    }

    fn end_batch(&self) -> Result<(), BoxError> {
        self.queue.finish(|signals| {
            self.round_trip();
            Ok(signals.into_iter().map(|s| self.sample(s)).collect())
        })?;
        Ok(())
    }
}

/// Build the producer for a named channel, or `None` for an unknown name.
pub fn producer(device: &Arc<SimDevice>, channel: &str) -> Option<Producer> {
    let device = Arc::clone(device);
    let producer = match channel {
        "nozzle_temp" => Producer::new(move || Ok(device.read(Signal::NozzleTemp).into())),
        "bed_temp" => Producer::new(move || Ok(device.read(Signal::BedTemp).into())),
        "fan_speed" => Producer::new(move || Ok(device.read(Signal::FanSpeed).into())),
        "status" => Producer::new(move || Ok(device.read(Signal::Status).into())),
        "position" => Producer::new(move || {
            Ok(Reading::sequence([
                device.read(Signal::AxisX),
                device.read(Signal::AxisY),
                device.read(Signal::AxisZ),
            ]))
        }),
        _ => return None,
    };
    Some(producer)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
