use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2 * 60);

pub type TickHandler = Box<dyn Fn() + Send + Sync + 'static>;

/// Fires every registered handler, in registration order, once per interval.
///
/// Each wait starts when the previous tick finished, so ticks drift instead of
/// following a fixed epoch. Handlers run inline on the ticking task; one that
/// needs I/O should spawn it, and such work may still be running when the
/// next tick fires.
pub struct Scheduler {
    interval: Duration,
    handlers: Arc<Mutex<Vec<TickHandler>>>,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            handlers: Arc::new(Mutex::new(Vec::new())),
            timer: None,
        }
    }

    /// Register a handler for every future tick, including ticks of an
    /// already running scheduler.
    pub fn schedule<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        match self.handlers.lock() {
            Ok(mut handlers) => handlers.push(Box::new(handler)),
            Err(poisoned) => poisoned.into_inner().push(Box::new(handler)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.as_ref().map_or(false, |timer| !timer.is_finished())
    }

    /// Arm the first timer. Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.is_running() {
            log::warn!("scheduler already running, ignoring start");
            return;
        }

        let interval = self.interval;
        let handlers = Arc::clone(&self.handlers);
        log::info!("starting scheduler (interval: {interval:?})");

        self.timer = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let registered = match handlers.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                log::debug!("tick: running {} handler(s)", registered.len());
                for handler in registered.iter() {
                    handler();
                }
            }
        }));
    }
}
