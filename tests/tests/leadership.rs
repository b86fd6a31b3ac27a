
use common::*;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use strata::core::keys::KeySpace;
use strata::{Config, KvBackend, LeaderElectionWorker, LeadershipState, Worker};
use strata_storage_memory::MemoryBackend;

const LEASE: Duration = Duration::from_millis(200);
const TICK: Duration = Duration::from_millis(20);

fn test_config() -> Config {
    Config { application: "election-test".to_string(), lease_timeout: LEASE, ..Config::default() }
}

fn worker(backend: Arc<MemoryBackend>, online: Arc<AtomicBool>, instance: &str) -> LeaderElectionWorker {
    LeaderElectionWorker::new(backend, &test_config(), online).with_instance_id(instance)
}

fn counter(signal: &strata::signals::Signal<()>) -> Arc<AtomicU32> {
    let count = Arc::new(AtomicU32::new(0));
    let clone = count.clone();
    signal
        .connect(move |_| {
            clone.fetch_add(1, Ordering::SeqCst);
        })
        .forget();
    count
}

#[tokio::test]
async fn exactly_one_instance_becomes_leader() {
    let backend = Arc::new(MemoryBackend::new());
    let online = Arc::new(AtomicBool::new(true));

    let mut a = worker(backend.clone(), online.clone(), "instance-a");
    let mut b = worker(backend.clone(), online.clone(), "instance-b");

    let deadline = Instant::now() + 2 * LEASE;
    while !a.is_leader() && !b.is_leader() {
        assert!(Instant::now() < deadline, "a leader must emerge within two lease timeouts");
        a.do_work().await;
        b.do_work().await;
        tokio::time::sleep(TICK).await;
    }

    for _ in 0..5 {
        a.do_work().await;
        b.do_work().await;
        assert!(!(a.is_leader() && b.is_leader()), "two leaders at once");
        assert!(a.is_leader() || b.is_leader());
        tokio::time::sleep(TICK).await;
    }

    // Both stay candidates while available.
    let key_a = KeySpace::leader_candidate("election-test", "instance-a");
    let key_b = KeySpace::leader_candidate("election-test", "instance-b");
    assert!(backend.get(&key_a).await.unwrap().is_some());
    assert!(backend.get(&key_b).await.unwrap().is_some());
}

#[tokio::test]
async fn survivor_takes_over_after_leader_dies() {
    let backend = Arc::new(MemoryBackend::new());
    let online = Arc::new(AtomicBool::new(true));

    let mut a = worker(backend.clone(), online.clone(), "instance-a");
    let mut b = worker(backend.clone(), online.clone(), "instance-b");

    let deadline = Instant::now() + 2 * LEASE;
    while !a.is_leader() && !b.is_leader() {
        assert!(Instant::now() < deadline);
        a.do_work().await;
        b.do_work().await;
        tokio::time::sleep(TICK).await;
    }

    let (dead, mut alive) = if a.is_leader() { (a, b) } else { (b, a) };
    let promoted = counter(&alive.signals.became_leader);
    drop(dead); // stops renewing; the lease runs out on its TTL

    let deadline = Instant::now() + 2 * LEASE + Duration::from_millis(100);
    while !alive.is_leader() {
        assert!(Instant::now() < deadline, "survivor must take over after the lease expires");
        alive.do_work().await;
        tokio::time::sleep(TICK).await;
    }
    assert_eq!(promoted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn availability_gates_the_state_machine() {
    let backend = Arc::new(MemoryBackend::new());
    let online = Arc::new(AtomicBool::new(false));

    let mut worker = worker(backend.clone(), online.clone(), "instance-a");
    let became_follower = counter(&worker.signals.became_follower);
    let became_unavailable = counter(&worker.signals.became_unavailable);

    worker.do_work().await;
    assert_eq!(worker.state(), LeadershipState::Unavailable);

    online.store(true, Ordering::SeqCst);
    worker.do_work().await;
    assert_eq!(worker.state(), LeadershipState::Follower);
    assert_eq!(became_follower.load(Ordering::SeqCst), 1);

    // While available the candidate beacon comes up on the next tick.
    worker.do_work().await;
    let candidate_key = KeySpace::leader_candidate("election-test", "instance-a");
    assert!(backend.get(&candidate_key).await.unwrap().is_some());

    online.store(false, Ordering::SeqCst);
    worker.do_work().await;
    assert_eq!(worker.state(), LeadershipState::Unavailable);
    assert_eq!(became_unavailable.load(Ordering::SeqCst), 1);
    assert!(backend.get(&candidate_key).await.unwrap().is_none(), "candidate beacon must be deleted while unavailable");
}

#[tokio::test]
async fn extra_criteria_are_conjoined() {
    let backend = Arc::new(MemoryBackend::new());
    let online = Arc::new(AtomicBool::new(true));

    let gate = Arc::new(AtomicBool::new(false));
    let mut worker = worker(backend, online, "instance-a");
    let gate_clone = gate.clone();
    worker.add_availability_criterion(move || gate_clone.load(Ordering::SeqCst));

    worker.do_work().await;
    assert_eq!(worker.state(), LeadershipState::Unavailable);

    gate.store(true, Ordering::SeqCst);
    worker.do_work().await;
    assert_eq!(worker.state(), LeadershipState::Follower);
}

#[tokio::test]
async fn losing_the_lease_demotes_with_signal() {
    let backend = Arc::new(MemoryBackend::new());
    let online = Arc::new(AtomicBool::new(true));

    let mut leader = worker(backend.clone(), online.clone(), "instance-a");
    let losing = counter(&leader.signals.losing_leadership);

    leader.do_work().await; // -> Follower
    leader.do_work().await; // -> Leader
    assert!(leader.is_leader());

    // Another instance stole the lease after an expiry we never observed.
    let lease_key = KeySpace::leader_lease("election-test");
    backend.del(&lease_key).await.unwrap();
    backend.set(&lease_key, "instance-b").await.unwrap();

    leader.do_work().await;
    assert_eq!(leader.state(), LeadershipState::Follower);
    assert_eq!(losing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn deinit_relinquishes_through_unavailable() {
    let backend = Arc::new(MemoryBackend::new());
    let online = Arc::new(AtomicBool::new(true));

    let mut leader = worker(backend.clone(), online, "instance-a");
    let losing = counter(&leader.signals.losing_leadership);
    let became_unavailable = counter(&leader.signals.became_unavailable);

    leader.do_work().await;
    leader.do_work().await;
    assert!(leader.is_leader());

    leader.deinit().await;
    assert_eq!(leader.state(), LeadershipState::Unavailable);
    assert_eq!(losing.load(Ordering::SeqCst), 1);
    assert_eq!(became_unavailable.load(Ordering::SeqCst), 1);

    let candidate_key = KeySpace::leader_candidate("election-test", "instance-a");
    assert!(backend.get(&candidate_key).await.unwrap().is_none());
}
