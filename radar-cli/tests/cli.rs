use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use radar_core::PriceSeries;
use radar_test_utils::{gentle_breakout, short_history};
use serde_json::Value;
use tempfile::{tempdir, TempDir};

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Result<Self> {
        let root = tempdir()?;
        fs::create_dir_all(root.path().join("config"))?;
        fs::create_dir_all(root.path().join("bars"))?;
        Ok(Self { root })
    }

    fn config_dir(&self) -> PathBuf {
        self.root.path().join("config")
    }

    fn bars_dir(&self) -> PathBuf {
        self.root.path().join("bars")
    }

    fn store(&self) -> PathBuf {
        self.root.path().join("accounts.db")
    }

    fn write_config(&self, body: &str) -> Result<()> {
        fs::write(self.config_dir().join("default.toml"), body)?;
        Ok(())
    }

    fn write_series(&self, series: &PriceSeries) -> Result<()> {
        write_csv(&self.bars_dir(), series)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("radar"));
        cmd.current_dir(self.root.path())
            .env_remove("RADAR_ACCESS_CODE")
            .env_remove("RADAR_ENV")
            .env("RUST_LOG", "warn")
            .arg("--config")
            .arg(self.config_dir());
        cmd
    }
}

fn write_csv(dir: &Path, series: &PriceSeries) -> Result<()> {
    let mut body = String::from("date,open,close,volume\n");
    for bar in series.bars() {
        let cell = |value: Option<rust_decimal::Decimal>| value.map(|v| v.to_string()).unwrap_or_default();
        body.push_str(&format!(
            "{},{},{},{}\n",
            bar.date,
            cell(bar.open),
            cell(bar.close),
            cell(bar.volume)
        ));
    }
    fs::write(dir.join(format!("{}.csv", series.ticker)), body)?;
    Ok(())
}

#[test]
fn scan_emits_json_candidates() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_series(&gentle_breakout("2330.TW"))?;
    ws.write_series(&short_history("1101.TW", 30))?;

    let output = ws
        .command()
        .args(["scan", "--data-dir"])
        .arg(ws.bars_dir())
        .args(["--format", "json"])
        .output()?;
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout)?;
    let candidates = report["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0]["ticker"], "2330.TW");
    assert_eq!(candidates[0]["industry"], "Semiconductor Foundry");
    assert_eq!(report["exclusions"][0]["ticker"], "1101.TW");
    assert_eq!(report["exclusions"][0]["code"], "insufficient_history");
    Ok(())
}

#[test]
fn scan_table_respects_ticker_filter() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_series(&gentle_breakout("2330.TW"))?;
    ws.write_series(&gentle_breakout("2317.TW"))?;

    let output = ws
        .command()
        .args(["scan", "--tickers", "2317.TW", "--data-dir"])
        .arg(ws.bars_dir())
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("2317.TW"));
    assert!(!stdout.contains("2330.TW"));
    assert!(stdout.contains("1 candidates"));
    Ok(())
}

#[test]
fn scan_requires_a_data_source() -> Result<()> {
    let ws = Workspace::new()?;
    ws.command().arg("scan").assert().failure();
    Ok(())
}

#[test]
fn access_code_gates_commands() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_config("[access]\ncodes = [\"letmein\"]\n")?;
    ws.write_series(&gentle_breakout("2330.TW"))?;

    let denied = ws
        .command()
        .args(["scan", "--data-dir"])
        .arg(ws.bars_dir())
        .output()?;
    assert!(!denied.status.success());
    assert!(String::from_utf8_lossy(&denied.stderr).contains("access denied"));

    ws.command()
        .args(["--access-code", "letmein", "scan", "--data-dir"])
        .arg(ws.bars_dir())
        .assert()
        .success();

    ws.command()
        .env("RADAR_ACCESS_CODE", "letmein")
        .args(["scan", "--data-dir"])
        .arg(ws.bars_dir())
        .assert()
        .success();
    Ok(())
}

#[test]
fn open_access_gate_is_logged() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write_series(&gentle_breakout("2330.TW"))?;

    let open = ws
        .command()
        .args(["scan", "--data-dir"])
        .arg(ws.bars_dir())
        .output()?;
    assert!(open.status.success());
    assert!(String::from_utf8_lossy(&open.stderr).contains("access gate disabled"));

    ws.write_config("[access]\ncodes = [\"letmein\"]\n")?;
    let gated = ws
        .command()
        .args(["--access-code", "letmein", "scan", "--data-dir"])
        .arg(ws.bars_dir())
        .output()?;
    assert!(gated.status.success());
    assert!(!String::from_utf8_lossy(&gated.stderr).contains("access gate disabled"));
    Ok(())
}

#[test]
fn account_trades_persist_between_runs() -> Result<()> {
    let ws = Workspace::new()?;
    let store = ws.store();
    let store = store.to_str().unwrap();

    ws.command()
        .args(["account", "--store", store, "buy", "--user", "alice"])
        .args(["--ticker", "2330.TW", "--lots", "2", "--price", "100"])
        .assert()
        .success();

    let shown = ws
        .command()
        .args(["account", "--store", store, "show", "--user", "alice"])
        .output()?;
    assert!(shown.status.success());
    let stdout = String::from_utf8(shown.stdout)?;
    assert!(stdout.contains("cash: 800000"), "{stdout}");
    assert!(stdout.contains("2330.TW"));

    let oversold = ws
        .command()
        .args(["account", "--store", store, "sell", "--user", "alice"])
        .args(["--ticker", "2330.TW", "--lots", "5", "--price", "100"])
        .output()?;
    assert!(!oversold.status.success());

    let liquidated = ws
        .command()
        .args(["account", "--store", store, "liquidate", "--user", "alice"])
        .output()?;
    assert!(liquidated.status.success());
    assert!(String::from_utf8(liquidated.stdout)?.contains("cash: 1000000"));
    Ok(())
}
