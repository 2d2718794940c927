//! Job templates posters draw from when they create jobs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub title: String,
    pub category: String,
    pub budget_min: f64,
    pub budget_max: f64,
}

impl JobTemplate {
    pub fn new(title: &str, category: &str, budget_min: f64, budget_max: f64) -> Self {
        Self {
            title: title.to_string(),
            category: category.to_string(),
            budget_min,
            budget_max,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() || self.category.trim().is_empty() {
            return Err("job template title and category must be non-empty".to_string());
        }
        if !(self.budget_min.is_finite() && self.budget_max.is_finite()) {
            return Err(format!("job template '{}' needs finite budgets", self.title));
        }
        if !(self.budget_min > 0.0 && self.budget_min <= self.budget_max) {
            return Err(format!(
                "job template '{}' needs 0 < budget_min <= budget_max",
                self.title
            ));
        }
        Ok(())
    }
}

pub fn default_catalog() -> Vec<JobTemplate> {
    vec![
        JobTemplate::new("Fix leaking kitchen sink", "Plumbing", 150.0, 400.0),
        JobTemplate::new("Replace bathroom faucet", "Plumbing", 120.0, 300.0),
        JobTemplate::new("Install ceiling light fixture", "Electrical", 100.0, 350.0),
        JobTemplate::new("Repaint living room walls", "Painting", 400.0, 1200.0),
        JobTemplate::new("Assemble office furniture", "Handyman", 80.0, 250.0),
        JobTemplate::new("Deep clean two-bedroom flat", "Cleaning", 120.0, 320.0),
        JobTemplate::new("Mow and edge back garden", "Gardening", 60.0, 180.0),
        JobTemplate::new("Move studio apartment", "Moving", 250.0, 700.0),
    ]
}
