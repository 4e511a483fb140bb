//! Flat-file audit trails: a CSV of fills and a plain-text log of
//! inventory-driven direction decisions.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::{OrderSide, OrderStatus};

const CSV_HEADER: &str = "timestamp,order_id,side,quantity,price,status";

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Append-only CSV of order fills, one file per contract.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    path: PathBuf,
}

impl TransactionLog {
    pub fn new(dir: &Path, contract_id: &str) -> Self {
        Self {
            path: dir.join(format!("{contract_id}_transactions.csv")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(
        &self,
        order_id: &str,
        side: OrderSide,
        quantity: &str,
        price: &str,
        status: OrderStatus,
    ) -> std::io::Result<()> {
        let new_file = !self.path.exists();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        if new_file {
            writeln!(file, "{CSV_HEADER}")?;
        }
        writeln!(
            file,
            "{},{order_id},{side},{quantity},{price},{status}",
            timestamp()
        )
    }
}

/// Plain-text record of every cycle where inventory changed the traded
/// direction or skipped the cycle entirely.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    path: PathBuf,
}

impl DecisionLog {
    pub fn new(dir: &Path, contract_id: &str) -> Self {
        Self {
            path: dir.join(format!("{contract_id}_inventory_decisions.log")),
        }
    }

    pub fn record(
        &self,
        net: f64,
        tier: &str,
        configured: OrderSide,
        executed: Option<OrderSide>,
        usage_pct: f64,
    ) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(
            file,
            "[{}] net={net:.6} tier={tier} configured={configured} executed={} usage={usage_pct:.1}%",
            timestamp(),
            executed.map(|s| s.as_str()).unwrap_or("SKIP"),
        )
    }
}
