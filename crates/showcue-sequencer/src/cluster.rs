//! Operator clusters: one playing sound and one offer per cluster.

use crate::remember::RecordId;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterSlot {
    /// Running record bound to the cluster.
    pub running: Option<RecordId>,
    /// Offer record waiting on the cluster's Start button.
    pub offer: Option<RecordId>,
}

#[derive(Debug, Clone)]
pub struct ClusterTable {
    slots: Vec<ClusterSlot>,
}

impl ClusterTable {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![ClusterSlot::default(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, cluster: usize) -> Result<&ClusterSlot> {
        self.slots.get(cluster).ok_or(Error::InvalidCluster(cluster))
    }

    pub fn get_mut(&mut self, cluster: usize) -> Result<&mut ClusterSlot> {
        self.slots
            .get_mut(cluster)
            .ok_or(Error::InvalidCluster(cluster))
    }

    /// Lowest-numbered cluster with nothing playing.
    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.running.is_none())
    }

    /// Cluster a running record is bound to.
    pub fn cluster_of(&self, id: RecordId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.running == Some(id))
    }
}
