// src/directory.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// An already-authenticated employee identity handed to the core by the auth
/// collaborator. The core never authenticates anyone itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub email: String,
    pub manager: bool,
}

impl Employee {
    pub fn new(email: impl Into<String>, manager: bool) -> Self {
        Self {
            id: Uuid::now_v7(),
            email: email.into().to_lowercase(),
            manager,
        }
    }
}

/// Identity resolution seam. Backed by the excluded auth/HR collaborator;
/// tests use an in-memory implementation.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn employee_by_email(&self, email: &str) -> Result<Option<Employee>, LedgerError>;
    async fn employee_by_id(&self, id: Uuid) -> Result<Option<Employee>, LedgerError>;
}
