//! Bench files: a whole reader network described in JSON.
//!
//! ```json
//! {
//!   "master": { "poll_interval_ms": 250 },
//!   "local": ["present_known_tag"],
//!   "satellites": [
//!     { "address": 16, "statuses": ["absent", "present_known_tag"], "boot_attempts": 2 }
//!   ],
//!   "script": [
//!     { "cycle": 3, "satellite": 16, "reader": 0, "status": "present_known_tag" }
//!   ]
//! }
//! ```

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tagsense_core::{ReaderStatus, SlaveAddress};
use tagsense_hardware::ReaderStatusProvider;
use tagsense_hardware::mock::{BusFault, LoopbackBus, MockReaderBank, MockReaderBankHandle};
use tagsense_master::{Aggregator, MasterConfig};
use tagsense_satellite::SatelliteResponder;
use tracing::{debug, info};

/// One simulated satellite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SatelliteSpec {
    pub address: SlaveAddress,

    /// Initial reader statuses; the length is the reader count.
    #[serde(default)]
    pub statuses: Vec<ReaderStatus>,

    /// Reader-count queries the satellite ignores before answering, as if
    /// it were still booting.
    #[serde(default)]
    pub boot_attempts: u32,
}

/// A status change applied just before a given poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedChange {
    pub cycle: u32,

    /// Satellite owning the reader; the master's own readers when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satellite: Option<SlaveAddress>,

    pub reader: u8,
    pub status: ReaderStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default)]
    pub master: MasterConfig,

    /// The master's own readers.
    #[serde(default)]
    pub local: Vec<ReaderStatus>,

    #[serde(default)]
    pub satellites: Vec<SatelliteSpec>,

    #[serde(default)]
    pub script: Vec<ScriptedChange>,
}

impl BenchConfig {
    /// Read and validate a bench file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading bench file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in bench file {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every script entry names an existing reader.
    pub fn validate(&self) -> Result<()> {
        self.master.validate()?;

        let mut counts = HashMap::new();
        for satellite in &self.satellites {
            ensure!(
                counts
                    .insert(satellite.address, satellite.statuses.len())
                    .is_none(),
                "satellite {} listed twice",
                satellite.address
            );
        }

        for change in &self.script {
            let readers = match change.satellite {
                Some(address) => *counts
                    .get(&address)
                    .with_context(|| format!("script names unknown satellite {}", address))?,
                None => self.local.len(),
            };
            ensure!(
                usize::from(change.reader) < readers,
                "script cycle {}: reader {} out of range ({} readers)",
                change.cycle,
                change.reader,
                readers
            );
        }
        Ok(())
    }

    /// A small two-satellite bench that walks through every verdict.
    pub fn sample() -> Result<Self> {
        use ReaderStatus::{Absent, PresentKnownTag, PresentUnknownTag};

        let a = SlaveAddress::new(0x10)?;
        let b = SlaveAddress::new(0x11)?;
        let change = |cycle, satellite, reader, status| ScriptedChange {
            cycle,
            satellite,
            reader,
            status,
        };

        Ok(Self {
            master: MasterConfig::default(),
            local: vec![PresentKnownTag],
            satellites: vec![
                SatelliteSpec {
                    address: a,
                    statuses: vec![PresentKnownTag, Absent],
                    boot_attempts: 0,
                },
                SatelliteSpec {
                    address: b,
                    statuses: vec![PresentKnownTag],
                    boot_attempts: 2,
                },
            ],
            script: vec![
                change(2, Some(a), 1, PresentKnownTag),
                change(4, Some(b), 0, PresentUnknownTag),
                change(6, None, 0, Absent),
            ],
        })
    }
}

/// Scripted tag movements and the reader handles they act on.
pub struct BenchScript {
    local: MockReaderBankHandle,
    satellites: HashMap<SlaveAddress, MockReaderBankHandle>,
    changes: Vec<ScriptedChange>,
}

impl BenchScript {
    /// Apply the script entries for `cycle`.
    pub fn apply(&self, cycle: u32) -> Result<usize> {
        let mut applied = 0;
        for change in self.changes.iter().filter(|change| change.cycle == cycle) {
            let readers = match change.satellite {
                Some(address) => match self.satellites.get(&address) {
                    Some(handle) => handle,
                    None => bail!("no satellite at {}", address),
                },
                None => &self.local,
            };
            readers.set_status(change.reader, change.status)?;
            debug!("Cycle {}: applied {:?}", cycle, change);
            applied += 1;
        }
        Ok(applied)
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }
}

/// A running bench: master, satellites and the handles that move tags.
pub struct Bench {
    pub master: Aggregator<LoopbackBus, MockReaderBank>,
    pub script: BenchScript,
    pub responders: Vec<Arc<SatelliteResponder<MockReaderBank>>>,
}

impl Bench {
    /// Wire every satellite to a loopback bus and register it.
    pub fn build(config: BenchConfig) -> Result<Self> {
        config.validate()?;

        let (local_readers, local) = MockReaderBank::with_statuses(config.local);
        let mut bus = LoopbackBus::new();
        let mut satellites = HashMap::new();
        let mut responders = Vec::new();
        let mut order = Vec::new();

        for satellite in config.satellites {
            let (readers, handle) = MockReaderBank::with_statuses(satellite.statuses);
            let responder = Arc::new(SatelliteResponder::new(satellite.address, readers));
            bus.attach(satellite.address, responder.clone());
            if satellite.boot_attempts > 0 {
                bus.inject_fault(
                    satellite.address,
                    BusFault::OfflineFor {
                        remaining: satellite.boot_attempts,
                    },
                );
            }

            satellites.insert(satellite.address, handle);
            responders.push(responder);
            order.push(satellite.address);
        }

        let mut master = Aggregator::new(bus, local_readers, config.master)?;
        for address in order {
            master.add_slave(address)?;
        }

        let mut changes = config.script;
        changes.sort_by_key(|change| change.cycle);
        let script = BenchScript {
            local,
            satellites,
            changes,
        };

        info!(
            "Bench ready: {} local readers, {} satellites, {} scripted changes",
            master.local().reader_count(),
            responders.len(),
            script.change_count()
        );

        Ok(Self {
            master,
            script,
            responders,
        })
    }
}
