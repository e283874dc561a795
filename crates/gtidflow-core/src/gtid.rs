//! GTID and GTID set handling.
//!
//! A GTID set is the merged record of every transaction already processed,
//! grouped by source server UUID. Its text form matches MySQL's
//! `gtid_executed` output, so a stored set can be handed straight to a
//! binlog client to resume streaming.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{Error, Result};

/// A single transaction identifier (`source_uuid:sequence`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gtid {
    /// UUID of the server that committed the transaction.
    pub source_id: Uuid,
    /// Sequence number of the transaction on that server, starting at 1.
    pub sequence: u64,
}

impl Gtid {
    pub fn new(source_id: Uuid, sequence: u64) -> Self {
        Self {
            source_id,
            sequence,
        }
    }
}

impl fmt::Display for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id.hyphenated(), self.sequence)
    }
}

impl FromStr for Gtid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (source, sequence) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::invalid_gtid(s, "expected <uuid>:<sequence>"))?;

        Ok(Gtid {
            source_id: parse_source_id(source, s)?,
            sequence: parse_sequence(sequence, s)?,
        })
    }
}

/// An inclusive range of transaction sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn contains(&self, sequence: u64) -> bool {
        self.start <= sequence && sequence <= self.end
    }

    fn covers(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    fn parse(part: &str, input: &str) -> Result<Self> {
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (parse_sequence(start, input)?, parse_sequence(end, input)?),
            None => {
                let n = parse_sequence(part, input)?;
                (n, n)
            }
        };

        if end < start {
            return Err(Error::invalid_gtid(
                input,
                format!("range '{}' is inverted", part),
            ));
        }

        Ok(Interval { start, end })
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

fn parse_source_id(s: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim())
        .map_err(|e| Error::invalid_gtid(input, format!("bad source uuid '{}': {}", s.trim(), e)))
}

fn parse_sequence(s: &str, input: &str) -> Result<u64> {
    let n: u64 = s
        .trim()
        .parse()
        .map_err(|_| Error::invalid_gtid(input, format!("'{}' is not a transaction number", s)))?;

    if n == 0 {
        return Err(Error::invalid_gtid(input, "transaction numbers start at 1"));
    }

    Ok(n)
}

/// The merged set of processed transactions.
///
/// Intervals for each source are kept sorted and coalesced, so two sets
/// holding the same transactions always render to the same string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GtidSet {
    sets: BTreeMap<Uuid, Vec<Interval>>,
}

impl GtidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a GTID set such as `uuid:1-5:7,uuid2:1-3`.
    ///
    /// The empty string is the empty set. Whitespace around elements is
    /// ignored, which accepts MySQL's multi-line `gtid_executed` output.
    pub fn parse(input: &str) -> Result<Self> {
        let mut set = GtidSet::new();

        for element in input.split(',') {
            let element = element.trim();
            if element.is_empty() {
                continue;
            }

            let mut parts = element.split(':');
            let source = parts.next().unwrap_or_default();
            let source_id = parse_source_id(source, input)?;

            let mut ranges = 0;
            for part in parts {
                set.insert(source_id, Interval::parse(part.trim(), input)?);
                ranges += 1;
            }

            if ranges == 0 {
                return Err(Error::invalid_gtid(
                    input,
                    format!("no transaction range for source {}", source_id),
                ));
            }
        }

        Ok(set)
    }

    /// Merge a GTID or GTID set string into this set.
    ///
    /// The input is parsed completely before anything is merged, so a
    /// parse error leaves the set untouched.
    pub fn update(&mut self, input: &str) -> Result<()> {
        let other = GtidSet::parse(input)?;
        self.merge(&other);
        Ok(())
    }

    pub fn merge(&mut self, other: &GtidSet) {
        for (source_id, intervals) in &other.sets {
            for interval in intervals {
                self.insert(*source_id, *interval);
            }
        }
    }

    pub fn contains(&self, gtid: &Gtid) -> bool {
        self.sets
            .get(&gtid.source_id)
            .is_some_and(|intervals| intervals.iter().any(|i| i.contains(gtid.sequence)))
    }

    /// Whether every transaction in `other` is also in this set.
    pub fn contains_set(&self, other: &GtidSet) -> bool {
        other.sets.iter().all(|(source_id, theirs)| {
            let Some(ours) = self.sets.get(source_id) else {
                return false;
            };
            theirs
                .iter()
                .all(|interval| ours.iter().any(|o| o.covers(interval)))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Source UUIDs with their merged intervals, in canonical order.
    pub fn sources(&self) -> impl Iterator<Item = (&Uuid, &[Interval])> {
        self.sets.iter().map(|(id, intervals)| (id, intervals.as_slice()))
    }

    fn insert(&mut self, source_id: Uuid, interval: Interval) {
        let intervals = self.sets.entry(source_id).or_default();
        intervals.push(interval);
        intervals.sort_unstable();

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for next in intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if next.start <= last.end.saturating_add(1) => {
                    last.end = last.end.max(next.end);
                }
                _ => merged.push(next),
            }
        }
        *intervals = merged;
    }
}

impl fmt::Display for GtidSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (source_id, intervals)) in self.sets.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", source_id.hyphenated())?;
            for interval in intervals {
                write!(f, ":{}", interval)?;
            }
        }
        Ok(())
    }
}

impl FromStr for GtidSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        GtidSet::parse(s)
    }
}
