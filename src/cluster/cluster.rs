use crate::cluster::{Endpoint, ServerId};
use std::collections::HashMap;

/// Cluster is the static membership of a raft group, as seen from the local server. It is fixed
/// for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct Cluster {
    local: Endpoint,
    peers: HashMap<ServerId, Endpoint>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Local server {0} is not a cluster member")]
    LocalNotMember(ServerId),
    #[error("Cluster member id {0} is listed more than once")]
    DuplicateMember(ServerId),
}

impl Cluster {
    pub fn new(local_id: ServerId, members: Vec<Endpoint>) -> Result<Self, ClusterError> {
        let mut local = None;
        let mut peers = HashMap::with_capacity(members.len());
        for member in members {
            let is_duplicate = peers.contains_key(member.id())
                || local.as_ref().map_or(false, |l: &Endpoint| l.id() == member.id());
            if is_duplicate {
                return Err(ClusterError::DuplicateMember(member.id().clone()));
            }

            if member.id() == &local_id {
                local = Some(member);
            } else {
                peers.insert(member.id().clone(), member);
            }
        }

        let local = local.ok_or(ClusterError::LocalNotMember(local_id))?;

        Ok(Cluster { local, peers })
    }

    pub fn local_id(&self) -> &ServerId {
        self.local.id()
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    pub fn member(&self, id: &ServerId) -> Option<&Endpoint> {
        if id == self.local.id() {
            Some(&self.local)
        } else {
            self.peers.get(id)
        }
    }

    pub fn contains_member(&self, id: &ServerId) -> bool {
        self.member(id).is_some()
    }

    pub fn peers(&self) -> impl Iterator<Item = &Endpoint> {
        self.peers.values()
    }

    pub fn peer_endpoints(&self) -> Vec<Endpoint> {
        self.peers.values().cloned().collect()
    }

    /// Number of members, including the local server.
    pub fn size(&self) -> usize {
        self.peers.len() + 1
    }

    /// `majority()` is the quorum size, ⌊n/2⌋+1.
    pub fn majority(&self) -> usize {
        (self.size() / 2) + 1
    }
}
