#![forbid(unsafe_code)]
//! Replays the Alice and Bob walkthrough: three transfers, three mined
//! blocks, a validity check and, with `tamper-hooks`, a tampered history.

use clap::Parser;
use colored::*;
use proofchain::config::{load_config, load_config_from, Config};
use proofchain::{Blockchain, CancelToken, Miner, SignatureService, Transaction, Wallet};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to ./config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override chain.difficulty
    #[arg(long)]
    difficulty: Option<u32>,
    /// Override chain.mining_reward
    #[arg(long)]
    reward: Option<u64>,
    /// Override miner.threads
    #[arg(long)]
    threads: Option<usize>,
    /// Print the final chain as JSON
    #[arg(long)]
    dump_json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let level: tracing::Level = config.logging.level.parse()?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let signer = SignatureService::new();
    let miner = Miner::new(config.miner.threads)?;
    let cancel = CancelToken::new();

    println!("{}", "*** Setup wallet for Alice ***".bright_cyan());
    let alice = Wallet::new(Some("alice".to_string()), &signer);
    println!("Has Alice got a valid wallet? {}", alice.is_valid(&signer));
    println!("Alice's public key: {}", alice.address());

    println!("\n{}", "*** Setup wallet for Bob ***".bright_cyan());
    let bob = Wallet::new(Some("bob".to_string()), &signer);
    println!("Has Bob got a valid wallet? {}", bob.is_valid(&signer));
    println!("Bob's public key: {}", bob.address());

    println!("\n{}", "*** Setup the blockchain ***".bright_cyan());
    let mut chain = Blockchain::with_config(&config.chain, signer.clone())?;
    println!(
        "Difficulty {}, mining reward {}, {} mining thread(s)",
        chain.difficulty(),
        chain.mining_reward(),
        miner.threads()
    );

    let rounds = [
        ("1st Transaction: Alice sends 10 to Bob", &alice, &bob, 10, &alice),
        ("2nd Transaction: Alice sends 15 to Bob", &alice, &bob, 15, &bob),
        ("3rd Transaction: Bob sends 26 to Alice", &bob, &alice, 26, &alice),
    ];
    for (title, from, to, amount, block_miner) in rounds {
        println!("\n{}", format!("*** {} ***", title).bright_cyan());
        let mut tx = Transaction::new(from.address(), to.address(), amount);
        tx.sign(from.key_pair(), &signer)?;
        chain.add_transaction_to_pending_pool(tx)?;

        println!("Mining block {}...", chain.height() + 1);
        let block = chain.mine_pending_transactions_with(block_miner.address(), &miner, &cancel)?;
        println!("Mined {} (nonce {})", block.hash().bright_green(), block.nonce());
        print_balances(&chain, &alice, &bob)?;
    }

    println!("\n{}", "*** Validate chain ***".bright_cyan());
    println!("Is the chain valid? {}", chain.is_valid());

    match tamper_and_revalidate(&mut chain) {
        Some(valid) => {
            println!("Is the chain valid after tampering? {}", valid);
            if let Err(violation) = chain.validate() {
                println!("{}", violation.to_string().bright_red());
            }
        }
        None => println!(
            "{}",
            "Skipping tamper step: rebuild with `--features tamper-hooks` to run it.".yellow()
        ),
    }

    if cli.dump_json {
        println!("{}", serde_json::to_string_pretty(chain.blocks())?);
    }

    Ok(())
}

/// Rewrites the second block's transfer and re-checks the chain. `None` when
/// tamper hooks are compiled out.
#[cfg(feature = "tamper-hooks")]
fn tamper_and_revalidate(chain: &mut Blockchain) -> Option<bool> {
    println!("Modify existing transaction");
    chain.tamper_transaction(2, 1)?.set_amount(23);
    Some(chain.is_valid())
}

#[cfg(not(feature = "tamper-hooks"))]
fn tamper_and_revalidate(_chain: &mut Blockchain) -> Option<bool> {
    None
}

fn resolve_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(difficulty) = cli.difficulty {
        config.chain.difficulty = difficulty;
    }
    if let Some(reward) = cli.reward {
        config.chain.mining_reward = reward;
    }
    if let Some(threads) = cli.threads {
        config.miner.threads = threads;
    }
    config.validate()?;
    Ok(config)
}

fn print_balances(chain: &Blockchain, alice: &Wallet, bob: &Wallet) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Account balance Alice : {}",
        chain.get_balance_of_address(alice.address())?
    );
    println!(
        "Account balance Bob : {}",
        chain.get_balance_of_address(bob.address())?
    );
    Ok(())
}
