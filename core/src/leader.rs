//! Lease-based leader election. One short-lived lease key per application
//! names the current leader; every available instance keeps a candidate
//! beacon alive. Safety rests on the backend's set-if-not-exists plus the
//! TTL-bounded lease; mutual exclusion is not guaranteed across clock skew
//! larger than one lease timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use tokio::time::Instant;
use tracing::{error, info, warn};

use strata_signals::Signal;

use crate::backend::KvBackend;
use crate::config::Config;
use crate::keys::KeySpace;
use crate::worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipState {
    Unavailable,
    Follower,
    Leader,
}

pub struct LeaderElectionSignals {
    pub became_leader: Signal<()>,
    pub became_follower: Signal<()>,
    pub became_unavailable: Signal<()>,
    /// Emitted on every exit from the Leader state, before the next state is
    /// entered, so handlers can drain leader-only obligations.
    pub losing_leadership: Signal<()>,
}

impl LeaderElectionSignals {
    fn new() -> Self {
        Self {
            became_leader: Signal::new(),
            became_follower: Signal::new(),
            became_unavailable: Signal::new(),
            losing_leadership: Signal::new(),
        }
    }
}

type AvailabilityCriterion = Box<dyn Fn() -> bool + Send + Sync>;

pub struct LeaderElectionWorker {
    pub signals: LeaderElectionSignals,

    backend: Arc<dyn KvBackend>,
    application: String,
    instance_id: String,
    lease_timeout: Duration,
    criteria: Vec<AvailabilityCriterion>,
    state: LeadershipState,
    last_lease_attempt: Option<Instant>,
    last_renewal: Option<Instant>,
    last_candidate_beat: Option<Instant>,
}

impl LeaderElectionWorker {
    /// `connectivity` is the built-in availability criterion: the shared
    /// backend-connectivity flag maintained by the store worker.
    pub fn new(backend: Arc<dyn KvBackend>, config: &Config, connectivity: Arc<AtomicBool>) -> Self {
        let mut worker = Self {
            signals: LeaderElectionSignals::new(),
            backend,
            application: config.application.clone(),
            instance_id: default_instance_id(config.in_container),
            lease_timeout: config.lease_timeout,
            criteria: Vec::new(),
            state: LeadershipState::Unavailable,
            last_lease_attempt: None,
            last_renewal: None,
            last_candidate_beat: None,
        };
        worker.add_availability_criterion(move || connectivity.load(Ordering::Relaxed));
        worker
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn add_availability_criterion(&mut self, criterion: impl Fn() -> bool + Send + Sync + 'static) {
        self.criteria.push(Box::new(criterion));
    }

    pub fn state(&self) -> LeadershipState { self.state }

    pub fn is_leader(&self) -> bool { self.state == LeadershipState::Leader }

    pub fn instance_id(&self) -> &str { &self.instance_id }

    pub fn is_available(&self) -> bool { self.criteria.iter().all(|criterion| criterion()) }

    fn transition(&mut self, next: LeadershipState) {
        if self.state == next {
            return;
        }
        if self.state == LeadershipState::Leader {
            self.signals.losing_leadership.emit(&());
        }
        self.state = next;
        info!(application = %self.application, instance = %self.instance_id, state = ?next, "leadership state changed");
        match next {
            LeadershipState::Leader => self.signals.became_leader.emit(&()),
            LeadershipState::Follower => self.signals.became_follower.emit(&()),
            LeadershipState::Unavailable => self.signals.became_unavailable.emit(&()),
        }
    }

    /// Who the lease key currently names, if anyone.
    async fn determine_leadership_status(&self) -> Option<String> {
        match self.backend.get(&KeySpace::leader_lease(&self.application)).await {
            Ok(holder) => holder,
            Err(err) => {
                error!(%err, "leadership status read failed");
                None
            }
        }
    }

    async fn acquire_lease(&self) -> bool {
        match self.backend.set_nx_with_ttl(&KeySpace::leader_lease(&self.application), &self.instance_id, self.lease_timeout).await {
            Ok(acquired) => acquired,
            Err(err) => {
                error!(%err, "lease acquisition failed");
                false
            }
        }
    }

    fn lease_attempt_due(&self) -> bool {
        self.last_lease_attempt.map_or(true, |attempted| attempted.elapsed() >= self.lease_timeout)
    }

    async fn renew_lease_if_due(&mut self) {
        let due = self.last_renewal.map_or(true, |renewed| renewed.elapsed() >= self.lease_timeout / 2);
        if !due {
            return;
        }
        self.last_renewal = Some(Instant::now());
        match self.backend.expire(&KeySpace::leader_lease(&self.application), self.lease_timeout).await {
            Ok(true) => {}
            Ok(false) => warn!("lease renewal found no lease key"),
            Err(err) => error!(%err, "lease renewal failed"),
        }
    }

    async fn heartbeat_candidate(&mut self) {
        let due = self.last_candidate_beat.map_or(true, |beat| beat.elapsed() >= self.lease_timeout / 2);
        if !due {
            return;
        }
        self.last_candidate_beat = Some(Instant::now());

        let key = KeySpace::leader_candidate(&self.application, &self.instance_id);
        if let Err(err) = self.backend.set(&key, &self.instance_id).await {
            error!(%err, "candidate beacon write failed");
            return;
        }
        if let Err(err) = self.backend.expire(&key, self.lease_timeout).await {
            error!(%err, "candidate beacon expiry failed");
        }
    }

    async fn drop_candidacy(&mut self) {
        self.last_candidate_beat = None;
        if let Err(err) = self.backend.del(&KeySpace::leader_candidate(&self.application, &self.instance_id)).await {
            error!(%err, "candidate beacon delete failed");
        }
    }
}

#[async_trait]
impl Worker for LeaderElectionWorker {
    async fn do_work(&mut self) {
        let available = self.is_available();

        match self.state {
            LeadershipState::Unavailable => {
                if available {
                    self.transition(LeadershipState::Follower);
                }
            }
            LeadershipState::Follower => {
                if !available {
                    self.drop_candidacy().await;
                    self.transition(LeadershipState::Unavailable);
                    return;
                }
                self.heartbeat_candidate().await;

                match self.determine_leadership_status().await {
                    Some(holder) if holder == self.instance_id => self.transition(LeadershipState::Leader),
                    Some(_) => {}
                    None => {
                        if self.lease_attempt_due() {
                            self.last_lease_attempt = Some(Instant::now());
                            if self.acquire_lease().await {
                                self.last_renewal = Some(Instant::now());
                                self.transition(LeadershipState::Leader);
                            }
                        }
                    }
                }
            }
            LeadershipState::Leader => {
                if !available {
                    self.drop_candidacy().await;
                    self.transition(LeadershipState::Unavailable);
                    return;
                }
                self.heartbeat_candidate().await;

                // Renewal never confirms identity on its own; the lease is
                // read first and only extended while it still names us.
                match self.determine_leadership_status().await {
                    Some(holder) if holder == self.instance_id => self.renew_lease_if_due().await,
                    _ => self.transition(LeadershipState::Follower),
                }
            }
        }
    }

    async fn deinit(&mut self) {
        self.drop_candidacy().await;
        // Fires losing_leadership first when currently Leader. The lease is
        // left to expire on its own TTL.
        self.transition(LeadershipState::Unavailable);
    }
}

fn default_instance_id(in_container: bool) -> String {
    if in_container {
        if let Ok(host) = std::env::var("HOSTNAME") {
            if !host.is_empty() {
                return host;
            }
        }
    }
    let entropy = uuid::Uuid::new_v4();
    general_purpose::STANDARD.encode(&entropy.as_bytes()[..8])
}
