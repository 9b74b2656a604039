use crate::models::directory::JobPriority;
use crate::models::dispatch::{Availability, ScoringFactor, Workload};

/// Additive point table for dispatch ranking.
#[derive(Debug, Clone)]
pub struct ScoringWeights {
    pub baseline: f64,
    /// `(exclusive upper bound in miles, points)`, checked in order.
    pub distance_tiers: Vec<(f64, f64)>,
    pub distance_beyond: f64,
    pub skill_match: f64,
    pub skill_mismatch: f64,
    pub available: f64,
    pub on_job: f64,
    pub heavy_load: f64,
    /// Jobs scheduled today at which an otherwise free technician counts as
    /// heavily loaded.
    pub heavy_load_jobs: u32,
    /// `(inclusive max jobs today, points)`, checked in order.
    pub workload_tiers: Vec<(u32, f64)>,
    pub overloaded_jobs: u32,
    pub overloaded: f64,
    pub urgent_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            baseline: 50.0,
            distance_tiers: vec![(5.0, 30.0), (15.0, 20.0), (30.0, 10.0), (50.0, 0.0)],
            distance_beyond: -10.0,
            skill_match: 20.0,
            skill_mismatch: -20.0,
            available: 15.0,
            on_job: -10.0,
            heavy_load: -15.0,
            heavy_load_jobs: 6,
            workload_tiers: vec![(2, 10.0), (4, 5.0)],
            overloaded_jobs: 6,
            overloaded: -5.0,
            urgent_bonus: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub distance_miles: Option<f64>,
    pub skill_matched: bool,
    pub workload: Workload,
    pub priority: JobPriority,
}

pub fn availability(workload: &Workload) -> Availability {
    if workload.active_jobs > 0 {
        Availability::OnJob
    } else {
        Availability::Available
    }
}

impl ScoringWeights {
    pub fn is_heavily_loaded(&self, workload: &Workload) -> bool {
        availability(workload) == Availability::Available
            && workload.scheduled_today >= self.heavy_load_jobs
    }

    /// Composite score clamped to 0..=100 and the factors that fired.
    pub fn score(&self, candidate: &Candidate) -> (f64, Vec<ScoringFactor>) {
        let mut factors = Vec::new();

        if let Some(distance) = candidate.distance_miles {
            let points = self
                .distance_tiers
                .iter()
                .find(|(bound, _)| distance < *bound)
                .map(|(_, points)| *points)
                .unwrap_or(self.distance_beyond);
            factors.push(factor("distance", points, format!("{distance:.1} mi from job")));
        }

        if candidate.skill_matched {
            factors.push(factor("skills", self.skill_match, "qualified for job type".to_string()));
        } else {
            factors.push(factor("skills", self.skill_mismatch, "missing job type skill".to_string()));
        }

        let heavy = self.is_heavily_loaded(&candidate.workload);
        match availability(&candidate.workload) {
            Availability::OnJob => factors.push(factor(
                "availability",
                self.on_job,
                format!("{} active job(s)", candidate.workload.active_jobs),
            )),
            Availability::Available if heavy => factors.push(factor(
                "availability",
                self.heavy_load,
                format!("heavily loaded ({} jobs today)", candidate.workload.scheduled_today),
            )),
            Availability::Available => {
                factors.push(factor("availability", self.available, "available".to_string()))
            }
        }

        let scheduled = candidate.workload.scheduled_today;
        let workload_points = self
            .workload_tiers
            .iter()
            .find(|(max_jobs, _)| scheduled <= *max_jobs)
            .map(|(_, points)| *points)
            .or((scheduled >= self.overloaded_jobs).then_some(self.overloaded));
        if let Some(points) = workload_points {
            factors.push(factor("workload", points, format!("{scheduled} job(s) today")));
        }

        if candidate.priority.is_urgent()
            && availability(&candidate.workload) == Availability::Available
            && !heavy
        {
            factors.push(factor(
                "priority",
                self.urgent_bonus,
                "urgent job, technician free".to_string(),
            ));
        }

        let raw = self.baseline + factors.iter().map(|f| f.points).sum::<f64>();
        (raw.clamp(0.0, 100.0), factors)
    }
}

fn factor(name: &str, points: f64, detail: String) -> ScoringFactor {
    ScoringFactor {
        factor: name.to_string(),
        points,
        detail,
    }
}
