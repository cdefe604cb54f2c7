use crate::generator::profile::SyntheticSensor;
use crate::workflow::config::StreamConfig;
use crate::workflow::coordinator::IngestionCoordinator;
use log::{info, warn};
use scancore::broadcast::DispatchOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Synthetic sensor feed running on its own OS thread.
pub struct SensorStream {
    running: Arc<AtomicBool>,
    handle: JoinHandle<u64>,
}

impl SensorStream {
    pub fn spawn(
        coordinator: Arc<IngestionCoordinator>,
        config: &StreamConfig,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let interval = Duration::from_millis(config.interval_ms.max(1));
        let mut sensor = SyntheticSensor::new(config.seed, config.jitter);

        let handle = thread::Builder::new()
            .name("sensor-stream".into())
            .spawn(move || {
                let mut published = 0u64;
                while flag.load(Ordering::Acquire) {
                    let frame = sensor.next_frame();
                    match coordinator.publish_from_thread(&frame) {
                        Ok(DispatchOutcome::Delivered(_)) => published += 1,
                        Ok(DispatchOutcome::NoContext) => break,
                        Ok(_) => {}
                        Err(err) => warn!("{} frame dropped: {:#}", frame.kind(), err),
                    }
                    thread::sleep(interval);
                }
                published
            })?;

        info!("sensor stream started at {} ms cadence", interval.as_millis());
        Ok(Self { running, handle })
    }

    /// Signals the thread and waits for it; returns the frames delivered.
    pub fn stop(self) -> u64 {
        self.running.store(false, Ordering::Release);
        match self.handle.join() {
            Ok(published) => {
                info!("sensor stream stopped after {} frames", published);
                published
            }
            Err(_) => {
                warn!("sensor stream thread panicked");
                0
            }
        }
    }
}
