use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A spy cat.
///
/// The breed is checked against the breed catalogue when the cat is hired and
/// never changes afterwards. Salary is the only field that can be edited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cat {
    pub id: Uuid,
    pub name: String,
    pub years_of_experience: u32,
    pub breed: String,
    pub salary: f64,
}

/// Input for hiring a new cat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCatInput {
    pub name: String,
    pub years_of_experience: u32,
    pub breed: String,
    pub salary: f64,
}

/// Input for updating a cat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCatInput {
    pub salary: f64,
}
