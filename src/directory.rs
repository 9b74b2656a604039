//! In-process stand-in for the master-record store (technicians, customers,
//! jobs). The tracking engines only read from it; job status changes arrive
//! through the lifecycle endpoints.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::directory::{
    CreateCustomerRequest, CreateJobRequest, CreateTechnicianRequest, Customer, Job, JobStatus,
    Technician,
};
use crate::models::dispatch::Workload;

#[derive(Default)]
pub struct Directory {
    technicians: DashMap<Uuid, Technician>,
    customers: DashMap<Uuid, Customer>,
    jobs: DashMap<Uuid, Job>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_technician(&self, request: CreateTechnicianRequest) -> Result<Technician, AppError> {
        if let Some(home) = &request.home {
            if !home.is_valid() {
                return Err(AppError::InvalidInput(
                    "home position is out of range".to_string(),
                ));
            }
        }

        let technician = Technician {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            photo_url: request.photo_url,
            skills: request
                .skills
                .into_iter()
                .map(|skill| skill.trim().to_string())
                .filter(|skill| !skill.is_empty())
                .collect(),
            home: request.home,
            is_active: request.is_active,
            created_at: Utc::now(),
        };

        self.technicians.insert(technician.id, technician.clone());
        Ok(technician)
    }

    pub fn add_customer(&self, request: CreateCustomerRequest) -> Result<Customer, AppError> {
        if let Some(location) = &request.location {
            if !location.is_valid() {
                return Err(AppError::InvalidInput(
                    "customer location is out of range".to_string(),
                ));
            }
        }

        let customer = Customer {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            location: request.location,
            phone: request.phone,
            email: request.email,
            created_at: Utc::now(),
        };

        self.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }

    pub fn add_job(&self, request: CreateJobRequest) -> Result<Job, AppError> {
        self.customer(request.customer_id)?;
        if let Some(technician_id) = request.technician_id {
            self.technician(technician_id)?;
        }
        if let Some(location) = &request.service_location {
            if !location.is_valid() {
                return Err(AppError::InvalidInput(
                    "service location is out of range".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            customer_id: request.customer_id,
            technician_id: request.technician_id,
            job_type: request.job_type.trim().to_string(),
            priority: request.priority,
            status: JobStatus::Scheduled,
            scheduled_date: request.scheduled_date,
            service_location: request.service_location,
            created_at: now,
            updated_at: now,
        };

        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    pub fn technician(&self, id: Uuid) -> Result<Technician, AppError> {
        self.technicians
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("technician {id} not found")))
    }

    pub fn customer(&self, id: Uuid) -> Result<Customer, AppError> {
        self.customers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("customer {id} not found")))
    }

    pub fn job(&self, id: Uuid) -> Result<Job, AppError> {
        self.jobs
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))
    }

    pub fn technicians(&self) -> Vec<Technician> {
        let mut technicians: Vec<Technician> = self
            .technicians
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        technicians.sort_by_key(|technician| technician.id);
        technicians
    }

    /// Active technicians in ascending id order. Dispatch ranking relies on
    /// this order being stable between calls.
    pub fn active_technicians(&self) -> Vec<Technician> {
        self.technicians()
            .into_iter()
            .filter(|technician| technician.is_active)
            .collect()
    }

    pub fn set_job_status(&self, id: Uuid, status: JobStatus) -> Result<(Job, JobStatus), AppError> {
        let mut job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;

        let previous = job.status;
        job.status = status;
        job.updated_at = Utc::now();

        Ok((job.clone(), previous))
    }

    /// Open jobs scheduled for `date` and the subset currently underway.
    /// Jobs without a scheduled date are not counted.
    pub fn workload(&self, technician_id: Uuid, date: NaiveDate) -> Workload {
        let mut workload = Workload::default();

        for entry in self.jobs.iter() {
            let job = entry.value();
            if job.technician_id != Some(technician_id)
                || job.scheduled_date != Some(date)
                || !job.status.is_open()
            {
                continue;
            }

            workload.scheduled_today += 1;
            if job.status.is_active() {
                workload.active_jobs += 1;
            }
        }

        workload
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::Directory;
    use crate::models::directory::{
        CreateCustomerRequest, CreateJobRequest, CreateTechnicianRequest, JobPriority, JobStatus,
    };

    fn seed() -> (Directory, uuid::Uuid, uuid::Uuid) {
        let directory = Directory::new();
        let technician = directory
            .add_technician(CreateTechnicianRequest {
                name: "Rosa".to_string(),
                photo_url: None,
                skills: vec![" pumping ".to_string(), "".to_string()],
                home: None,
                is_active: true,
            })
            .unwrap();
        let customer = directory
            .add_customer(CreateCustomerRequest {
                name: "Acme".to_string(),
                location: None,
                phone: None,
                email: None,
            })
            .unwrap();
        (directory, technician.id, customer.id)
    }

    fn job_request(customer_id: uuid::Uuid, technician_id: uuid::Uuid, date: NaiveDate) -> CreateJobRequest {
        CreateJobRequest {
            customer_id,
            technician_id: Some(technician_id),
            job_type: "pumping".to_string(),
            priority: JobPriority::Normal,
            scheduled_date: Some(date),
            service_location: None,
        }
    }

    #[test]
    fn skills_are_trimmed_and_blank_entries_dropped() {
        let (directory, technician_id, _) = seed();
        let technician = directory.technician(technician_id).unwrap();
        assert_eq!(technician.skills, vec!["pumping".to_string()]);
    }

    #[test]
    fn job_for_unknown_customer_is_rejected() {
        let (directory, technician_id, _) = seed();
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let result = directory.add_job(job_request(uuid::Uuid::new_v4(), technician_id, date));
        assert!(result.is_err());
    }

    #[test]
    fn workload_counts_open_and_active_jobs_for_the_day() {
        let (directory, technician_id, customer_id) = seed();
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();

        let first = directory.add_job(job_request(customer_id, technician_id, today)).unwrap();
        directory.add_job(job_request(customer_id, technician_id, today)).unwrap();
        let done = directory.add_job(job_request(customer_id, technician_id, today)).unwrap();
        directory.add_job(job_request(customer_id, technician_id, tomorrow)).unwrap();

        directory.set_job_status(first.id, JobStatus::EnRoute).unwrap();
        directory.set_job_status(done.id, JobStatus::Completed).unwrap();

        let workload = directory.workload(technician_id, today);
        assert_eq!(workload.scheduled_today, 2);
        assert_eq!(workload.active_jobs, 1);
    }
}
