//! Example demonstrating two-phase commit rounds across three nodes
//!
//! One coordinator ("alpha") and two participants ("bravo", "charlie")
//! share an in-process cluster. The participants vote with the default
//! weighted random policy, so most rounds commit and some abort. The
//! example finishes by failing the coordinator over to bravo.
//!
//! Run with: cargo run --example two_phase

use lockstep_cluster::Cluster;
use lockstep_log::{DecisionLog, FileDecisionLog, MemoryDecisionLog};
use lockstep_manager::{TxnManager, TxnOutcome};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lockstep_manager=warn".parse()?),
        )
        .init();

    println!("=== Two-Phase Commit Example ===\n");

    // 1. Create the shared cluster fabric
    let cluster = Cluster::new();
    println!("✓ Created cluster");

    // 2. Open a durable decision log for the coordinator
    let log_path = std::env::temp_dir().join(format!("lockstep_demo_{}.log", uuid::Uuid::new_v4()));
    let log = Arc::new(FileDecisionLog::new(&log_path)?);
    println!("✓ Opened decision log at {}", log_path.display());

    // 3. One coordinator and two participants with the default vote policy
    let alpha = Arc::new(TxnManager::coordinator("alpha", cluster.clone(), log.clone()));
    let bravo = Arc::new(TxnManager::participant(
        "bravo",
        cluster.clone(),
        Arc::new(MemoryDecisionLog::default()),
    ));
    let charlie = Arc::new(TxnManager::participant(
        "charlie",
        cluster.clone(),
        Arc::new(MemoryDecisionLog::default()),
    ));
    println!("✓ Created managers alpha (coordinator), bravo, charlie");

    // 4. Link the group: the coordinator holds sibling names, participants
    //    know the coordinator's name, and everyone serves peer requests
    alpha.set_siblings(["bravo", "charlie"]);
    bravo.set_coordinator("alpha")?;
    charlie.set_coordinator("alpha")?;
    bravo.start();
    charlie.start();
    println!("✓ Linked siblings and started participants\n");

    // 5. Drive a few rounds; with two 80%-ready voters roughly a third of
    //    rounds end up aborted
    println!("=== Running Commit Rounds ===");
    for _ in 0..4 {
        let txn_id = alpha.init_transaction(None)?;
        bravo.init_transaction(Some(txn_id))?;
        charlie.init_transaction(Some(txn_id))?;

        match alpha.run_commit(txn_id).await? {
            TxnOutcome::Committed => println!("✓ Transaction {} committed", txn_id),
            TxnOutcome::Aborted { reason } => {
                println!("! Transaction {} aborted: {}", txn_id, reason)
            }
        }
    }

    // Give in-flight one-way abort notifications time to land
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // 6. Every node drove its own copy of each transaction to a final state
    println!("\n=== Final States ===");
    for manager in [&alpha, &bravo, &charlie] {
        let states: Vec<String> = manager
            .transactions()
            .into_iter()
            .map(|(id, state)| format!("{id}:{state}"))
            .collect();
        println!("  {:<8} {}", manager.name(), states.join("  "));
    }

    // 7. Only commit decisions reach the durable log, and they did so
    //    before any participant was told to commit
    println!("\n=== Decision Log ===");
    for record in log.decisions()? {
        println!(
            "  transaction {} -> {} at {}",
            record.txn_id, record.decision, record.recorded_at
        );
    }

    // 8. Fail the coordinator over to bravo and run one more round
    println!("\n=== Coordinator Failover ===");
    cluster.leave("alpha");
    bravo.become_coordinator();
    bravo.set_siblings(["charlie"]);
    charlie.set_coordinator("bravo")?;
    println!("✓ Promoted bravo; it mints ids above everything it has seen");

    let txn_id = bravo.init_transaction(None)?;
    charlie.init_transaction(Some(txn_id))?;
    match bravo.run_commit(txn_id).await? {
        TxnOutcome::Committed => println!("✓ Transaction {} committed under bravo", txn_id),
        TxnOutcome::Aborted { reason } => println!("! Transaction {} aborted: {}", txn_id, reason),
    }

    println!("\n=== Example Complete ===");
    std::fs::remove_file(&log_path).ok();

    Ok(())
}

// Example output (votes are random, so runs differ):
//
// === Two-Phase Commit Example ===
//
// ✓ Created cluster
// ✓ Opened decision log at /tmp/lockstep_demo_8f2c....log
// ✓ Created managers alpha (coordinator), bravo, charlie
// ✓ Linked siblings and started participants
//
// === Running Commit Rounds ===
// ✓ Transaction 1 committed
// ! Transaction 2 aborted: prepare rejected by charlie
// ✓ Transaction 3 committed
// ✓ Transaction 4 committed
//
// === Final States ===
//   alpha    1:committed  2:aborted  3:committed  4:committed
//   bravo    1:committed  2:aborted  3:committed  4:committed
//   charlie  1:committed  2:aborted  3:committed  4:committed
//
// === Decision Log ===
//   transaction 1 -> commit at 1756117403123456us
//   transaction 3 -> commit at 1756117403125012us
//   transaction 4 -> commit at 1756117403126702us
//
// === Coordinator Failover ===
// ✓ Promoted bravo; it mints ids above everything it has seen
// ✓ Transaction 5 committed under bravo
//
// === Example Complete ===
