//! Global tag verdict over local and satellite readers.
//!
//! The aggregator owns the bus, the local readers and the slave registry.
//! Each poll cycle builds one status vector (local readers first, then every
//! satellite in registration order), reduces it to a [`GlobalTagStatus`] and
//! publishes the verdict when it changes.

use crate::{config::MasterConfig, registry::SlaveRegistry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ops::ControlFlow;
use tagsense_core::{
    Error, GlobalTagStatus, ReaderStatus, Result, SlaveAddress, constants::EVENT_CHANNEL_CAPACITY,
};
use tagsense_hardware::traits::{BusTransport, ReaderStatusProvider};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Published whenever the global verdict changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerdictChange {
    pub previous: GlobalTagStatus,
    pub current: GlobalTagStatus,

    /// Number of readings the new verdict was computed from.
    pub readings: usize,

    pub timestamp: DateTime<Utc>,
}

/// Master-side aggregator.
///
/// # Example
///
/// ```no_run
/// use tagsense_core::SlaveAddress;
/// use tagsense_hardware::mock::{LoopbackBus, MockReaderBank};
/// use tagsense_master::{Aggregator, MasterConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> tagsense_core::Result<()> {
/// let (local, _handle) = MockReaderBank::new(1);
/// let mut master = Aggregator::new(LoopbackBus::new(), local, MasterConfig::default())?;
/// master.add_slave(SlaveAddress::new(0x10)?)?;
///
/// let cancel = CancellationToken::new();
/// for (address, e) in master.initialize_all(&cancel).await? {
///     eprintln!("slave {} offline: {}", address, e);
/// }
/// master.run(cancel).await;
/// # Ok(())
/// # }
/// ```
pub struct Aggregator<B, P> {
    bus: B,
    local: P,
    registry: SlaveRegistry,
    config: MasterConfig,
    status: GlobalTagStatus,
    omitted: Vec<SlaveAddress>,
    events: broadcast::Sender<VerdictChange>,
}

impl<B: BusTransport, P: ReaderStatusProvider> Aggregator<B, P> {
    /// Create an aggregator with no satellites and a `Missing` verdict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` does not validate.
    pub fn new(bus: B, local: P, config: MasterConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Creating aggregator: {} local readers, poll every {:?}",
            local.reader_count(),
            config.poll_interval
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            bus,
            local,
            registry: SlaveRegistry::new(),
            config,
            status: GlobalTagStatus::default(),
            omitted: Vec::new(),
            events,
        })
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Direct bus access, e.g. to attach a satellite after construction.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn local(&self) -> &P {
        &self.local
    }

    pub fn registry(&self) -> &SlaveRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// Register a satellite; its reader count stays unknown until
    /// initialization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateSlave`] if the address is already
    /// registered.
    pub fn add_slave(&mut self, address: SlaveAddress) -> Result<()> {
        let position = self.registry.register(address)?;
        info!("Registered slave {} at position {}", address, position);
        Ok(())
    }

    /// Initialize every satellite in registration order.
    ///
    /// Each satellite is retried according to the configured policy before
    /// moving on to the next. A satellite that gives up does not stop the
    /// sweep; its error is returned alongside its address and the poll cycle
    /// keeps trying it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires; satellites after the
    /// current one are left uninitialized.
    pub async fn initialize_all(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(SlaveAddress, Error)>> {
        let policy = self.config.retry;
        let mut failures = Vec::new();

        for slave in self.registry.iter_mut() {
            match slave.initialize(&mut self.bus, &policy, cancel).await {
                Ok(_) => {}
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!("Slave {} left uninitialized: {}", slave.address(), e);
                    failures.push((slave.address(), e));
                }
            }
        }

        info!(
            "{} of {} slaves initialized, {} readers in total",
            self.registry.len() - failures.len(),
            self.registry.len(),
            self.global_reader_count()
        );
        Ok(failures)
    }

    /// Local readers plus every satellite's last known reader count.
    pub fn global_reader_count(&self) -> usize {
        usize::from(self.local.reader_count()) + self.registry.total_reader_count()
    }

    /// Cached reader count of one satellite.
    pub fn slave_reader_count(&self, address: SlaveAddress) -> Result<u8> {
        Ok(self.registry.get(address)?.reader_count())
    }

    /// Ask one satellite for its reader count again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnregisteredSlave`] for an unknown address, or the
    /// communication error of the exchange.
    pub async fn requery_reader_count(&mut self, address: SlaveAddress) -> Result<u8> {
        let slave = self.registry.get_mut(address)?;
        slave.query_reader_count(&mut self.bus).await
    }

    /// Read the statuses of one satellite.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnregisteredSlave`] for an unknown address, or the
    /// communication error of the exchange.
    pub async fn query_slave_status(&mut self, address: SlaveAddress) -> Result<Vec<ReaderStatus>> {
        let slave = self.registry.get(address)?;
        slave.query_status(&mut self.bus).await
    }

    /// Build the global status vector.
    ///
    /// Local readers come first, then each satellite in registration order.
    /// A satellite whose query fails contributes nothing and later
    /// satellites move up, so the vector never has holes. A satellite that
    /// has never reported its reader count is asked once more first; if it
    /// still does not answer it is omitted.
    pub async fn collect_global_status(&mut self) -> Vec<ReaderStatus> {
        let mut readings = self.local.snapshot_statuses();
        readings.reserve(self.registry.total_reader_count());
        self.omitted.clear();

        for slave in self.registry.iter_mut() {
            if !slave.is_initialized() {
                if let Err(e) = slave.query_reader_count(&mut self.bus).await {
                    warn!("Slave {} still uninitialized: {}", slave.address(), e);
                    self.omitted.push(slave.address());
                    continue;
                }
                info!(
                    "Slave {} came online with {} readers",
                    slave.address(),
                    slave.reader_count()
                );
            }

            match slave.query_status(&mut self.bus).await {
                Ok(statuses) => readings.extend(statuses),
                Err(e) => {
                    warn!("Dropping slave {} from this cycle: {}", slave.address(), e);
                    self.omitted.push(slave.address());
                }
            }
        }

        debug!("Global reader state: {:?}", readings);
        readings
    }

    /// Reduce readings to a verdict.
    pub fn evaluate_global_status(readings: &[ReaderStatus]) -> GlobalTagStatus {
        tagsense_core::evaluate_global_status(readings)
    }

    /// Collect, evaluate and publish.
    ///
    /// Returns the new verdict if it differs from the stored one, `None`
    /// otherwise.
    pub async fn poll_cycle(&mut self) -> Option<GlobalTagStatus> {
        let readings = self.collect_global_status().await;
        let current = Self::evaluate_global_status(&readings);
        debug!("Global status: {}", current);

        if current == self.status {
            return None;
        }

        let previous = std::mem::replace(&mut self.status, current);
        info!("Global status changed: {} -> {}", previous, current);

        // Nobody listening is fine
        let _ = self.events.send(VerdictChange {
            previous,
            current,
            readings: readings.len(),
            timestamp: Utc::now(),
        });
        Some(current)
    }

    /// Last published verdict.
    pub fn global_status(&self) -> GlobalTagStatus {
        self.status
    }

    /// Satellites left out of the most recent collection.
    pub fn omitted_slaves(&self) -> &[SlaveAddress] {
        &self.omitted
    }

    /// Clear the local tag cache and every satellite's.
    ///
    /// Failures do not stop the sweep; they are returned per address.
    pub async fn clear_all_caches(&mut self) -> Vec<(SlaveAddress, Error)> {
        if self.local.reader_count() > 0 {
            self.local.clear_cache();
        }

        let mut failures = Vec::new();
        for slave in self.registry.iter() {
            if let Err(e) = slave.clear_tag_cache(&mut self.bus).await {
                warn!("Could not clear cache on slave {}: {}", slave.address(), e);
                failures.push((slave.address(), e));
            }
        }

        info!(
            "Tag caches cleared ({} of {} slaves failed)",
            failures.len(),
            self.registry.len()
        );
        failures
    }

    /// Subscribe to verdict changes.
    pub fn subscribe(&self) -> broadcast::Receiver<VerdictChange> {
        self.events.subscribe()
    }

    /// Poll every `config.poll_interval` until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) {
        self.run_with(cancel, |_| ControlFlow::Continue(())).await;
    }

    /// Like [`run`](Self::run), calling `before_cycle` with the cycle index
    /// ahead of every poll.
    ///
    /// Polling stops when `cancel` fires or `before_cycle` breaks. Returns the
    /// number of completed poll cycles.
    pub async fn run_with<F>(&mut self, cancel: CancellationToken, mut before_cycle: F) -> u32
    where
        F: FnMut(u32) -> ControlFlow<()>,
    {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Polling every {:?}", self.config.poll_interval);

        let mut cycles = 0u32;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if before_cycle(cycles).is_break() {
                        break;
                    }
                    self.poll_cycle().await;
                    cycles += 1;
                }
            }
        }

        info!(
            "Polling stopped after {} cycles, last status {}",
            cycles, self.status
        );
        cycles
    }
}
