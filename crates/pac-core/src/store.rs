use crate::event::StreamEvent;
use crate::model::{ArrayElement, ElementId, ElementStatus, Job, JobId, JobStatus, Snapshot};
use crate::reconcile::{self, ApplyOutcome};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("element {element} assigned to unknown job {job}")]
    DanglingAssignment { element: ElementId, job: JobId },
    #[error("element {element} assigned to job {job} which is {status}")]
    AssignmentToIdleJob {
        element: ElementId,
        job: JobId,
        status: JobStatus,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub idle: usize,
    pub active: usize,
    pub fault: usize,
}

impl StatusCounts {
    pub fn jobs_in(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }

    pub fn elements_in(&self, status: ElementStatus) -> usize {
        match status {
            ElementStatus::Idle => self.idle,
            ElementStatus::Active => self.active,
            ElementStatus::Fault => self.fault,
        }
    }
}

/// Canonical in-memory view of scheduler state for one session.
///
/// Mutated only through [`StateStore::load_snapshot`] and
/// [`StateStore::apply_event`]; both take `&mut self` and finish before
/// returning, so readers holding `&StateStore` only ever see whole states.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    pub(crate) jobs: Vec<Job>,
    pub(crate) job_index: HashMap<JobId, usize>,
    pub(crate) elements: Vec<ArrayElement>,
    pub(crate) element_index: HashMap<ElementId, usize>,
    fence: u64,
    revision: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = Self::new();
        store.load_snapshot(snapshot);
        store
    }

    /// Replace both collections with a scheduler read. Nothing reconciled
    /// locally survives.
    pub fn load_snapshot(&mut self, snapshot: Snapshot) {
        let Snapshot { jobs, elements } = snapshot;

        self.jobs.clear();
        self.job_index.clear();
        for job in jobs {
            if self.job_index.contains_key(&job.id) {
                warn!("snapshot_duplicate_job: id={}", job.id);
                continue;
            }
            self.job_index.insert(job.id, self.jobs.len());
            self.jobs.push(job);
        }

        self.elements.clear();
        self.element_index.clear();
        for mut element in elements {
            if self.element_index.contains_key(&element.id) {
                warn!("snapshot_duplicate_element: id={}", element.id);
                continue;
            }
            if let Some(job_id) = element.assigned_job {
                let running = self
                    .job(job_id)
                    .map(|job| job.status == JobStatus::Running)
                    .unwrap_or(false);
                if !running {
                    warn!(
                        "snapshot_dangling_assignment: element={} job={job_id}",
                        element.id
                    );
                    element.assigned_job = None;
                }
            }
            self.element_index.insert(element.id, self.elements.len());
            self.elements.push(element);
        }

        self.revision += 1;
        debug!(
            jobs = self.jobs.len(),
            elements = self.elements.len(),
            revision = self.revision,
            "snapshot_loaded"
        );
    }

    /// Single mutation path for delta events.
    pub fn apply_event(&mut self, event: &StreamEvent) -> ApplyOutcome {
        let outcome = reconcile::apply(self, event);
        if outcome.changed() {
            self.revision += 1;
        }
        debug_assert!(self.check_invariants().is_ok());
        outcome
    }

    /// Apply an event stamped with the generation of the connection that
    /// delivered it. Generations older than the fence were superseded by a
    /// snapshot taken on a newer connection and are dropped.
    pub fn apply_delivery(&mut self, generation: u64, event: &StreamEvent) -> ApplyOutcome {
        if generation < self.fence {
            debug!(
                generation,
                fence = self.fence,
                kind = event.kind(),
                "stale_event_dropped"
            );
            return ApplyOutcome::Stale;
        }
        self.apply_event(event)
    }

    /// Snapshot load paired with a fence at `generation`.
    pub fn load_snapshot_fenced(&mut self, snapshot: Snapshot, generation: u64) {
        self.load_snapshot(snapshot);
        self.fence = self.fence.max(generation);
    }

    pub fn fence(&self) -> u64 {
        self.fence
    }

    /// Bumped on every mutation that changed something.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn elements(&self) -> &[ArrayElement] {
        &self.elements
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.job_index.get(&id).map(|&idx| &self.jobs[idx])
    }

    pub fn element(&self, id: ElementId) -> Option<&ArrayElement> {
        self.element_index.get(&id).map(|&idx| &self.elements[idx])
    }

    pub fn elements_assigned_to(&self, job_id: JobId) -> impl Iterator<Item = &ArrayElement> {
        self.elements
            .iter()
            .filter(move |element| element.assigned_job == Some(job_id))
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in &self.jobs {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        for element in &self.elements {
            match element.status {
                ElementStatus::Idle => counts.idle += 1,
                ElementStatus::Active => counts.active += 1,
                ElementStatus::Fault => counts.fault += 1,
            }
        }
        counts
    }

    /// Mean amplitude over Active elements, clamped to the valid range.
    pub fn mean_active_amplitude(&self) -> Option<f64> {
        let active: Vec<f64> = self
            .elements
            .iter()
            .filter(|element| element.status == ElementStatus::Active)
            .map(|element| clamp_amplitude(element.amplitude))
            .collect();
        if active.is_empty() {
            return None;
        }
        Some(active.iter().sum::<f64>() / active.len() as f64)
    }

    /// Every assignment must point at a Running job.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for element in &self.elements {
            let Some(job_id) = element.assigned_job else {
                continue;
            };
            match self.job(job_id) {
                None => {
                    return Err(InvariantViolation::DanglingAssignment {
                        element: element.id,
                        job: job_id,
                    })
                }
                Some(job) if job.status != JobStatus::Running => {
                    return Err(InvariantViolation::AssignmentToIdleJob {
                        element: element.id,
                        job: job_id,
                        status: job.status,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl PartialEq for StateStore {
    fn eq(&self, other: &Self) -> bool {
        self.jobs == other.jobs && self.elements == other.elements
    }
}

/// Clamp to [0, 100]. NaN is treated as the bottom of the range rather than
/// as missing data.
pub fn clamp_amplitude(amplitude: f64) -> f64 {
    if amplitude.is_nan() {
        return crate::model::AMPLITUDE_MIN;
    }
    amplitude.clamp(crate::model::AMPLITUDE_MIN, crate::model::AMPLITUDE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GridPos;

    fn job(id: JobId, status: JobStatus) -> Job {
        Job {
            id,
            name: format!("job-{id}"),
            priority: 5,
            status,
            needed_elements: 3,
            duration_seconds: 60,
            created_at: "2024-05-01T10:00:00Z".to_string(),
            resource_type: None,
        }
    }

    fn elements(count: u64) -> Vec<ArrayElement> {
        (1..=count)
            .map(|id| {
                ArrayElement::idle(
                    id,
                    Some(GridPos {
                        x: ((id - 1) % 4) as i64,
                        y: ((id - 1) / 4) as i64,
                    }),
                )
            })
            .collect()
    }

    #[test]
    fn snapshot_replaces_everything() {
        let mut store = StateStore::from_snapshot(Snapshot {
            jobs: vec![job(1, JobStatus::Pending)],
            elements: elements(4),
        });
        store.apply_event(&StreamEvent::JobStarted {
            job_id: 1,
            element_ids: vec![1, 2],
        });

        let fresh = Snapshot {
            jobs: vec![job(2, JobStatus::Pending)],
            elements: elements(2),
        };
        store.load_snapshot(fresh.clone());
        assert_eq!(store.jobs(), fresh.jobs.as_slice());
        assert_eq!(store.elements(), fresh.elements.as_slice());
        assert!(store.job(1).is_none());
        assert!(store.element(3).is_none());
    }

    #[test]
    fn snapshot_drops_duplicates_and_dangling_assignments() {
        let mut assigned = ArrayElement::idle(1, None);
        assigned.status = ElementStatus::Active;
        assigned.assigned_job = Some(1);
        let mut orphan = ArrayElement::idle(2, None);
        orphan.assigned_job = Some(99);
        let store = StateStore::from_snapshot(Snapshot {
            jobs: vec![job(1, JobStatus::Running), job(1, JobStatus::Failed)],
            elements: vec![assigned, orphan, ArrayElement::idle(1, None)],
        });
        assert_eq!(store.jobs().len(), 1);
        assert_eq!(store.job(1).map(|j| j.status), Some(JobStatus::Running));
        assert_eq!(store.elements().len(), 2);
        assert_eq!(store.element(1).and_then(|e| e.assigned_job), Some(1));
        assert_eq!(store.element(2).and_then(|e| e.assigned_job), None);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn fenced_generations_are_stale() {
        let mut store = StateStore::new();
        store.load_snapshot_fenced(
            Snapshot {
                jobs: vec![job(1, JobStatus::Pending)],
                elements: elements(2),
            },
            3,
        );
        let start = StreamEvent::JobStarted {
            job_id: 1,
            element_ids: vec![1],
        };
        assert_eq!(store.apply_delivery(2, &start), ApplyOutcome::Stale);
        assert_eq!(store.job(1).map(|j| j.status), Some(JobStatus::Pending));
        assert!(store.apply_delivery(3, &start).changed());
        assert_eq!(store.job(1).map(|j| j.status), Some(JobStatus::Running));
    }

    #[test]
    fn fence_never_moves_backwards() {
        let mut store = StateStore::new();
        store.load_snapshot_fenced(Snapshot::default(), 5);
        store.load_snapshot_fenced(Snapshot::default(), 2);
        assert_eq!(store.fence(), 5);
    }

    #[test]
    fn revision_tracks_effective_mutations() {
        let mut store = StateStore::from_snapshot(Snapshot {
            jobs: vec![job(1, JobStatus::Pending)],
            elements: elements(2),
        });
        let base = store.revision();
        store.apply_event(&StreamEvent::JobEnded { job_id: 1 });
        assert_eq!(store.revision(), base);
        store.apply_event(&StreamEvent::JobStarted {
            job_id: 1,
            element_ids: vec![2],
        });
        assert_eq!(store.revision(), base + 1);
    }

    #[test]
    fn counts_and_mean_amplitude() {
        let mut hot = ArrayElement::idle(1, None);
        hot.status = ElementStatus::Active;
        hot.amplitude = 150.0;
        let mut warm = ArrayElement::idle(2, None);
        warm.status = ElementStatus::Active;
        warm.amplitude = 50.0;
        let mut broken = ArrayElement::idle(3, None);
        broken.status = ElementStatus::Fault;
        let store = StateStore::from_snapshot(Snapshot {
            jobs: vec![job(1, JobStatus::Pending), job(2, JobStatus::Failed)],
            elements: vec![hot, warm, broken, ArrayElement::idle(4, None)],
        });
        let counts = store.counts();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.active, 2);
        assert_eq!(counts.fault, 1);
        assert_eq!(counts.idle, 1);
        let jobs: usize = JobStatus::ALL.iter().map(|&s| counts.jobs_in(s)).sum();
        let elements: usize = ElementStatus::ALL
            .iter()
            .map(|&s| counts.elements_in(s))
            .sum();
        assert_eq!((jobs, elements), (2, 4));
        assert_eq!(counts.jobs_in(JobStatus::Running), 0);
        assert_eq!(store.mean_active_amplitude(), Some(75.0));
    }

    #[test]
    fn clamp_keeps_zero_and_bounds_outliers() {
        assert_eq!(clamp_amplitude(0.0), 0.0);
        assert_eq!(clamp_amplitude(-3.0), 0.0);
        assert_eq!(clamp_amplitude(250.0), 100.0);
        assert_eq!(clamp_amplitude(f64::NAN), 0.0);
    }
}
