///! # CLI - CinderKV Interactive Shell
///!
///! A REPL-style command-line interface for the CinderKV storage engine.
///! Reads commands from stdin, executes them against the engine, and prints
///! results to stdout. Designed for both interactive use and scripted
///! testing (pipe commands via stdin).
///!
///! ## Commands
///!
///! ```text
///! SET key value      Insert or update a key-value pair
///! GET key            Look up a key (prints value or "(nil)")
///! DEL key            Delete a key (writes a tombstone)
///! KEYS               List every live key in ascending order
///! MERGE              Compact the immutable segments
///! SYNC               fsync the active segment
///! STATS              Print engine debug info
///! EXIT / QUIT        Shut down gracefully
///! ```
///!
///! ## Configuration
///!
///! All settings are controlled via environment variables:
///!
///! ```text
///! CINDER_DIR        Data directory             (default: "data/cinderkv")
///! CINDER_SEGMENT_MB Segment cap in MiB         (default: 256)
///! CINDER_SYNC       fsync every append         (default: "false")
///! ```

use anyhow::Result;
use engine::{Engine, IndexType, Options};
use std::io::{self, BufRead, Write};

/// Reads a configuration value from the environment, falling back to
/// `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    let dir = env_or("CINDER_DIR", "data/cinderkv");
    let segment_mb: i64 = env_or("CINDER_SEGMENT_MB", "256").parse().unwrap_or(256);
    let sync_writes: bool = env_or("CINDER_SYNC", "false").parse().unwrap_or(false);

    let engine = Engine::open(Options {
        dir_path: dir.clone().into(),
        data_file_size: segment_mb * 1024 * 1024,
        sync_writes,
        index_type: IndexType::Btree,
    })?;

    println!(
        "CinderKV started (dir={}, segment={}MiB, sync={})",
        dir, segment_mb, sync_writes
    );
    println!("Commands: SET key value | GET key | DEL key | KEYS");
    println!("          MERGE | SYNC | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" => match parts.next() {
                    Some(key) => {
                        let value: String = parts.collect::<Vec<&str>>().join(" ");
                        if value.is_empty() {
                            println!("ERR usage: SET key value");
                        } else {
                            match engine.put(key.as_bytes().to_vec(), value.into_bytes()) {
                                Ok(()) => println!("OK"),
                                Err(e) => println!("ERR {}", e),
                            }
                        }
                    }
                    None => println!("ERR usage: SET key value"),
                },
                "GET" => match parts.next() {
                    Some(key) => match engine.get(key.as_bytes()) {
                        Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
                        Err(engine::Error::KeyNotFound) => println!("(nil)"),
                        Err(e) => println!("ERR {}", e),
                    },
                    None => println!("ERR usage: GET key"),
                },
                "DEL" => match parts.next() {
                    Some(key) => match engine.delete(key.as_bytes().to_vec()) {
                        Ok(()) => println!("OK"),
                        Err(e) => println!("ERR {}", e),
                    },
                    None => println!("ERR usage: DEL key"),
                },
                "KEYS" => match engine.list_keys() {
                    Ok(keys) => {
                        for key in &keys {
                            println!("{}", String::from_utf8_lossy(key));
                        }
                        println!("({} keys)", keys.len());
                    }
                    Err(e) => println!("ERR {}", e),
                },
                "MERGE" => match engine.merge() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR {}", e),
                },
                "SYNC" => match engine.sync() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR {}", e),
                },
                "STATS" => println!("{:?}", engine),
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => println!("ERR unknown command {:?}", other),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    engine.close()?;
    Ok(())
}
