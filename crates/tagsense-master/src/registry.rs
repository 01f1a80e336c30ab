//! Registered satellites in registration order.

use crate::proxy::SlaveProxy;
use std::collections::HashMap;
use tagsense_core::{Error, Result, SlaveAddress};

/// Ordered set of slave proxies with lookup by address.
///
/// Registration order is the order satellites contribute to the global
/// status vector. An address can be registered at most once.
#[derive(Debug, Default)]
pub struct SlaveRegistry {
    slaves: Vec<SlaveProxy>,
    index: HashMap<SlaveAddress, usize>,
}

impl SlaveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a satellite, returning its position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateSlave`] if the address is already
    /// registered; the registry is left unchanged.
    pub fn register(&mut self, address: SlaveAddress) -> Result<usize> {
        if self.index.contains_key(&address) {
            return Err(Error::DuplicateSlave(address));
        }

        let position = self.slaves.len();
        self.slaves.push(SlaveProxy::new(address, position));
        self.index.insert(address, position);
        Ok(position)
    }

    /// Position of a registered address.
    pub fn position(&self, address: SlaveAddress) -> Result<usize> {
        self.index
            .get(&address)
            .copied()
            .ok_or(Error::UnregisteredSlave(address))
    }

    pub fn get(&self, address: SlaveAddress) -> Result<&SlaveProxy> {
        let position = self.position(address)?;
        Ok(&self.slaves[position])
    }

    pub fn get_mut(&mut self, address: SlaveAddress) -> Result<&mut SlaveProxy> {
        let position = self.position(address)?;
        Ok(&mut self.slaves[position])
    }

    pub fn contains(&self, address: SlaveAddress) -> bool {
        self.index.contains_key(&address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlaveProxy> {
        self.slaves.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SlaveProxy> {
        self.slaves.iter_mut()
    }

    /// Addresses in registration order.
    pub fn addresses(&self) -> Vec<SlaveAddress> {
        self.slaves.iter().map(SlaveProxy::address).collect()
    }

    /// Sum of the cached reader counts.
    pub fn total_reader_count(&self) -> usize {
        self.slaves
            .iter()
            .map(|slave| usize::from(slave.reader_count()))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.slaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slaves.is_empty()
    }
}
