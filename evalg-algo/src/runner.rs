//! JSON-lines event driver
//!
//! Input holds one event per line: a JSON array of banks, each
//! `{"name": ..., "rows": [{column: value, ...}, ...]}`. Blank lines are
//! skipped. Output has the same shape, with masked rows dropped and rejected
//! events omitted.

use crate::algorithm::Algorithm;
use evalg_common::bank::find_bank;
use evalg_common::{BankList, Error, Result};
use std::io::{BufRead, Write};
use std::thread;
use tracing::{debug, info};

/// Totals for one processing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: usize,
    pub accepted: usize,
    pub threads: usize,
}

/// Parse every event from a JSON-lines source
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<BankList>> {
    let mut events = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let banks: BankList = serde_json::from_str(&line)
            .map_err(|e| Error::Config(format!("event on line {}: {}", number + 1, e)))?;
        events.push(banks);
    }
    debug!("read {} events", events.len());
    Ok(events)
}

/// Write events as JSON lines, keeping only active rows
pub fn write_events<W: Write>(mut writer: W, events: &[BankList]) -> Result<()> {
    for banks in events {
        let filtered: BankList = banks.iter().map(|bank| bank.to_filtered()).collect();
        serde_json::to_writer(&mut writer, &filtered)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Bank names of an event, in order
pub fn bank_layout(banks: &BankList) -> Vec<String> {
    banks.iter().map(|bank| bank.name().to_string()).collect()
}

/// Reorder `banks` to match `layout`
///
/// Algorithms cache bank positions at start, so every event must present
/// its banks in the same order as the first one. Extra banks are dropped.
pub fn align_banks(layout: &[String], mut banks: BankList) -> Result<BankList> {
    if bank_layout(&banks) == layout {
        return Ok(banks);
    }
    let mut aligned = Vec::with_capacity(layout.len());
    for name in layout {
        let position = find_bank(&banks, name).ok_or_else(|| Error::MissingInput {
            bank: name.clone(),
            algorithm: "event runner".to_string(),
        })?;
        aligned.push(banks.swap_remove(position));
    }
    Ok(aligned)
}

/// Reject multi-threaded runs of algorithms keeping a single shared slot
pub fn check_threading(algorithm: &dyn Algorithm, threads: usize) -> Result<()> {
    if threads > 1 && algorithm.is_sequential_only() {
        return Err(Error::ModelMisuse(format!(
            "'{}' uses concurrency model 'none', which needs sequential processing, but {} threads were requested",
            algorithm.name(),
            threads
        )));
    }
    Ok(())
}

/// Run `algorithm` over `events` on `threads` workers sharing the one instance
///
/// Returns the accepted events in input order. The first error from any
/// worker aborts the pass. Algorithms using the `none` model require
/// `threads == 1`.
pub fn run_events(algorithm: &dyn Algorithm, events: Vec<BankList>, threads: usize) -> Result<(Vec<BankList>, RunSummary)> {
    let threads = threads.max(1);
    check_threading(algorithm, threads)?;
    let total = events.len();
    let layout = events.first().map(bank_layout).unwrap_or_default();
    info!(algorithm = %algorithm.name(), events = total, threads, "processing events");

    let mut lanes: Vec<Vec<(usize, BankList)>> = (0..threads).map(|_| Vec::new()).collect();
    for (index, banks) in events.into_iter().enumerate() {
        lanes[index % threads].push((index, banks));
    }

    let layout = &layout;
    let results: Vec<Result<Vec<(usize, BankList, bool)>>> = thread::scope(|scope| {
        let handles: Vec<_> = lanes
            .into_iter()
            .map(|lane| {
                scope.spawn(move || {
                    lane.into_iter()
                        .map(|(index, banks)| {
                            let mut banks = align_banks(layout, banks)?;
                            let accepted = algorithm.run(&mut banks)?;
                            Ok((index, banks, accepted))
                        })
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::Internal("event worker panicked".to_string())))
            })
            .collect()
    });

    let mut processed = Vec::with_capacity(total);
    for lane in results {
        processed.extend(lane?);
    }
    processed.sort_by_key(|(index, _, _)| *index);

    let accepted: Vec<BankList> = processed
        .into_iter()
        .filter_map(|(_, banks, accepted)| accepted.then_some(banks))
        .collect();
    let summary = RunSummary {
        events: total,
        accepted: accepted.len(),
        threads,
    };
    info!(
        algorithm = %algorithm.name(),
        events = summary.events,
        accepted = summary.accepted,
        "processing complete"
    );
    Ok((accepted, summary))
}
