use anyhow::{Context, Result};
use probtouch::grammar::Surface;
use probtouch::{EventKind, MediationOutcome, Session, TouchSample};

use crate::trace::TraceRow;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub ms: u64,
    pub kind: &'static str,
    pub interactor: String,
}

impl Decision {
    pub fn csv(&self) -> String {
        format!("decision,{},{},{}", self.ms, self.kind, self.interactor)
    }

    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.interactor)
    }
}

/// Feeds trace rows into a session, pairing moves with the other pointer
/// while two pointers are down.
pub struct Replayer {
    session: Session,
    surface: Surface,
    active: [Option<TouchSample>; 2],
    decisions: Vec<Decision>,
}

impl Replayer {
    pub fn new(session: Session, surface: Surface) -> Self {
        Self {
            session,
            surface,
            active: [None, None],
            decisions: Vec::new(),
        }
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    pub fn feed(&mut self, row: TraceRow) -> Result<()> {
        if let Some(outcome) = self.session.advance_time(row.ms) {
            self.record(row.ms, &outcome);
        }

        let sample = row.to_sample(self.surface);
        let slot = usize::from(sample.pointer_id.min(1));
        self.active[slot] = match sample.kind {
            EventKind::Up => None,
            EventKind::Down | EventKind::Move => Some(sample),
        };

        let second = self.active[1 - slot].map(|other| TouchSample {
            kind: EventKind::Move,
            timestamp_ms: sample.timestamp_ms,
            ..other
        });
        let outcome = self
            .session
            .handle_event(sample, second)
            .with_context(|| format!("sample at {} ms rejected", row.ms))?;
        if let Some(outcome) = outcome {
            self.record(row.ms, &outcome);
        }
        Ok(())
    }

    fn record(&mut self, ms: u64, outcome: &MediationOutcome) {
        let groups = [
            ("promote", outcome.promoted.as_slice()),
            ("exclude", outcome.excluded.as_slice()),
            ("determine", outcome.determined.as_slice()),
        ];
        for (kind, ids) in groups {
            for id in ids {
                let interactor = self
                    .session
                    .interactor(*id)
                    .map(|core| core.name().to_string())
                    .unwrap_or_else(|| id.to_string());
                log::debug!("decision ms={} kind={} interactor={}", ms, kind, interactor);
                self.decisions.push(Decision {
                    ms,
                    kind,
                    interactor,
                });
            }
        }
    }
}
