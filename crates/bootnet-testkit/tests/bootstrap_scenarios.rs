//! Whole-network bootstrap scenarios on simulated effects

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use bootnet_core::{BootstrapError, SignalKey, ValidatorName};
use bootnet_protocol::{NodeState, SignalStore, Transition, WaitPolicy};
use bootnet_testkit::{fixtures, DeliveryDelays, SimulatedCluster};
use std::time::Duration;

fn name(n: &str) -> ValidatorName {
    ValidatorName::new_unchecked(n)
}

fn short_wait() -> WaitPolicy {
    WaitPolicy::default().with_timeout_secs(10)
}

#[tokio::test]
async fn test_three_nodes_converge_on_one_genesis() {
    let network = fixtures::network(3).unwrap();
    let cluster = SimulatedCluster::new(&network).unwrap();

    let reports: Vec<_> = cluster
        .run_all()
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    for report in &reports {
        assert_eq!(report.final_state, NodeState::Running);
        assert!(!report.warm_restart);
    }

    let leader_genesis = cluster.host("val1").unwrap().genesis().await.unwrap();
    assert_eq!(leader_genesis.accounts.len(), 3);
    assert_eq!(leader_genesis.gen_txs.len(), 3);
    for host in cluster.hosts() {
        assert_eq!(host.genesis().await.unwrap(), leader_genesis);
        assert_eq!(host.launches().await, 1);
    }

    let val2 = cluster.host("val2").unwrap();
    let val3 = cluster.host("val3").unwrap();
    let expected = format!(
        "{}@val2:26656,{}@val3:26656",
        val2.node_id(),
        val3.node_id()
    );
    assert_eq!(reports[0].persistent_peers, expected);
    assert_eq!(
        cluster.host("val1").unwrap().persistent_peers().await.unwrap(),
        expected
    );
}

#[tokio::test]
async fn test_leader_collects_only_after_every_gentx() {
    let network = fixtures::network(3).unwrap();
    let cluster = SimulatedCluster::with_delays(
        &network,
        DeliveryDelays::none().with_key(SignalKey::Gentx(name("val3")), 30_000),
    )
    .unwrap();

    for result in cluster.run_all().await {
        assert_eq!(result.unwrap().final_state, NodeState::Running);
    }
    let commands = cluster.host("val1").unwrap().commands().await;
    let collects = commands
        .iter()
        .filter(|c| c.starts_with("genesis collect-gentxs"))
        .count();
    assert_eq!(collects, 1);
}

#[tokio::test]
async fn test_follower_addresses_overtaking_keep_set_order() {
    let network = fixtures::network(3).unwrap();
    let cluster = SimulatedCluster::with_delays(
        &network,
        DeliveryDelays::none().with_key(SignalKey::Address(name("val2")), 20_000),
    )
    .unwrap();

    for result in cluster.run_all().await {
        assert_eq!(result.unwrap().final_state, NodeState::Running);
    }
    let genesis = cluster.host("val1").unwrap().genesis().await.unwrap();
    let funded: Vec<_> = genesis.accounts.iter().map(|a| a.address.as_str()).collect();
    let expected: Vec<_> = ["val1", "val2", "val3"]
        .iter()
        .map(|n| cluster.host(n).unwrap().address())
        .collect();
    assert_eq!(funded, expected);
    for host in cluster.hosts() {
        assert_eq!(host.genesis().await.unwrap(), genesis);
    }
}

#[tokio::test]
async fn test_late_follower_still_converges() {
    let network = fixtures::network(2).unwrap();
    let cluster = SimulatedCluster::new(&network)
        .unwrap()
        .with_start_offset("val2", Duration::from_secs(45));

    for result in cluster.run_all().await {
        assert_eq!(result.unwrap().final_state, NodeState::Running);
    }
}

#[tokio::test]
async fn test_warm_restart_skips_initialization() {
    let network = fixtures::network(2).unwrap();
    let cluster = SimulatedCluster::new(&network).unwrap();
    for result in cluster.run_all().await {
        result.unwrap();
    }
    let genesis_before = cluster.host("val2").unwrap().genesis().await.unwrap();
    let commands_before = cluster.host("val2").unwrap().commands().await.len();

    let reports: Vec<_> = cluster
        .run_all()
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let follower = &reports[1];
    assert!(follower.warm_restart);
    assert_eq!(
        follower.transitions,
        vec![
            Transition {
                from: NodeState::Uninitialized,
                to: NodeState::PeerDiscovery
            },
            Transition {
                from: NodeState::PeerDiscovery,
                to: NodeState::Ready
            },
            Transition {
                from: NodeState::Ready,
                to: NodeState::Running
            },
        ]
    );
    assert!(follower.published.contains(&SignalKey::NodeId(name("val2"))));

    let host = cluster.host("val2").unwrap();
    let rerun = &host.commands().await[commands_before..];
    assert!(rerun.iter().all(|c| !c.starts_with("init")));
    assert!(rerun.iter().all(|c| !c.starts_with("genesis")));
    assert_eq!(host.genesis().await.unwrap(), genesis_before);
    assert_eq!(host.launches().await, 2);
}

#[tokio::test]
async fn test_missing_follower_stalls_leader() {
    let network = fixtures::network(2).unwrap();
    let cluster = SimulatedCluster::new(&network)
        .unwrap()
        .with_wait(short_wait());

    let results = cluster.run_only(&["val1"]).await;
    let err = results.into_iter().next().unwrap().unwrap_err();
    assert_matches!(
        err,
        BootstrapError::CoordinationStall { ref validator, ref missing, waited_ms }
            if validator == "val1"
                && missing == &vec![SignalKey::Address(name("val2"))]
                && waited_ms >= 10_000
    );
    assert!(err.to_string().contains("val2_address"));
    assert_eq!(cluster.host("val1").unwrap().launches().await, 0);
}

#[tokio::test]
async fn test_conflicting_signal_aborts_publisher() {
    let network = fixtures::network(2).unwrap();
    let cluster = SimulatedCluster::new(&network)
        .unwrap()
        .with_wait(short_wait());
    let key = SignalKey::Address(name("val2"));
    cluster.store().preload(&key, b"blog1stale\n").await.unwrap();

    let results = cluster.run_all().await;
    assert_matches!(
        &results[1],
        Err(BootstrapError::SignalConflict { signal }) if *signal == key
    );
    assert_matches!(
        &results[0],
        Err(BootstrapError::CoordinationStall { missing, .. })
            if missing == &vec![SignalKey::Gentx(name("val2"))]
    );
    assert_eq!(
        cluster.store().fetch(&key).await.unwrap().unwrap(),
        b"blog1stale\n"
    );
}

#[tokio::test]
async fn test_failed_collection_leaves_followers_waiting() {
    let network = fixtures::network(3).unwrap();
    let cluster = SimulatedCluster::new(&network)
        .unwrap()
        .with_wait(short_wait())
        .map_host("val1", |host| host.failing_on("collect-gentxs"));

    let results = cluster.run_all().await;
    assert_matches!(
        &results[0],
        Err(BootstrapError::CommandFailed { command, .. }) if command.contains("collect-gentxs")
    );
    for result in &results[1..] {
        assert_matches!(
            result,
            Err(BootstrapError::CoordinationStall { missing, .. })
                if missing == &vec![SignalKey::FinalGenesis]
        );
    }
    assert!(!cluster
        .store()
        .published()
        .await
        .contains(&SignalKey::SetupComplete));
    for host in cluster.hosts() {
        assert_eq!(host.launches().await, 0);
    }
}

#[tokio::test]
async fn test_single_validator_needs_no_peers() {
    let network = fixtures::network(1).unwrap();
    let cluster = SimulatedCluster::new(&network).unwrap();
    let report = cluster.run_all().await.remove(0).unwrap();
    assert_eq!(report.final_state, NodeState::Running);
    assert_eq!(report.persistent_peers, "");
    assert_eq!(
        cluster.host("val1").unwrap().genesis().await.unwrap().gen_txs.len(),
        1
    );
}
