//! Three-node gossip walkthrough: funded accounts, fee-paying transfers,
//! mining, a stale node, and longest-chain fork resolution.

use clap::Parser;
use ledgermesh::config::ChainConfig;
use ledgermesh::crypto::KeyPair;
use ledgermesh::ledger::Ledger;
use ledgermesh::node::Node;
use ledgermesh::transaction::Amount;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ledgermesh-demo",
    about = "Runs a three-node ledgermesh network through transfers, mining, and a fork"
)]
struct Args {
    /// Required leading zero hex digits in each mined block hash
    #[arg(long, default_value_t = 2)]
    difficulty: u32,

    /// Dump each node's chain as JSON instead of the text summary
    #[arg(long)]
    json: bool,
}

fn print_node_state(name: &str, node: &Arc<Node>, json: bool) {
    node.with_ledger(|ledger| {
        println!("\n{name}:");
        if json {
            match serde_json::to_string_pretty(&ledger.chain) {
                Ok(dump) => println!("{dump}"),
                Err(e) => println!("  <failed to serialize chain: {e}>"),
            }
        } else {
            for block in &ledger.chain {
                let when = chrono::DateTime::from_timestamp_millis(block.timestamp_ms as i64)
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| block.timestamp_ms.to_string());
                println!("  Block {}", hex::encode(block.hash));
                println!("    Nonce: {}", block.nonce);
                println!("    Timestamp: {when}");
                println!("    Previous: {}", hex::encode(block.previous_hash));
                for tx in &block.transactions {
                    println!(
                        "    {} -> {}  amount {} fee {}",
                        tx.from, tx.to, tx.amount, tx.fee
                    );
                }
            }
        }
        println!("  Balances:");
        for (address, balance) in ledger.state.snapshot() {
            if address != ledger.source_address {
                println!("    {address} -> {balance}");
            }
        }
    });
}

fn print_network_state(nodes: &[(&str, &Arc<Node>)], json: bool) {
    println!("\n=== Network state ===");
    for (name, node) in nodes {
        print_node_state(name, node, json);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = ChainConfig {
        difficulty: args.difficulty,
        ..ChainConfig::default()
    };

    // The first participant funds the network through the genesis reward
    let kp1 = KeyPair::generate()?;
    let mut ledger = Ledger::with_config(&kp1, config)?;
    let kp2 = ledger.create_keypair()?;
    let kp3 = ledger.create_keypair()?;
    let (a1, a2, a3) = (kp1.address(), kp2.address(), kp3.address());
    println!("Participant addresses: {a1}, {a2}, {a3}");

    // Two more participants join with copies of the same history
    let node1 = Node::new(ledger);
    let node2 = node1.clone_node();
    let node3 = node1.clone_node();
    Node::connect(&node1, &node2);
    Node::connect(&node2, &node3);

    let nodes = [("Node 1", &node1), ("Node 2", &node2), ("Node 3", &node3)];

    node1.create_transaction(&kp1, a1, a2, Amount::from_num(10), Amount::from_num(1))?;
    node1.create_transaction(&kp1, a1, a3, Amount::from_num(20), Amount::from_num(2))?;
    node1.mine_pending_transactions(&kp1, a1)?;
    print_network_state(&nodes, args.json);

    node2.create_transaction(&kp2, a2, a3, Amount::from_num(5), Amount::from_num(2))?;
    node3.mine_pending_transactions(&kp1, a1)?;
    print_network_state(&nodes, args.json);

    node3.create_transaction(&kp3, a3, a2, Amount::from_num(8), Amount::from_num(2))?;

    // Simulate a stale participant: node 1 silently loses its tip, then
    // node 3 extends the network's chain and gossip resolves the fork
    node1.with_ledger_mut(|ledger| {
        ledger.chain.pop();
    });
    node3.mine_pending_transactions(&kp2, a2)?;
    print_network_state(&nodes, args.json);

    Ok(())
}
