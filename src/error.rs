// src/error.rs
use std::fmt;

#[derive(Debug)]
pub enum LedgerError {
    InsufficientBalance,
    BudgetExceeded,
    TransferLimitExceeded,
    InvalidAmount,
    SelfTransfer,
    RecipientDomainNotAllowed(String),
    AccountNotFound,
    EmployeeNotFound(String),
    NotAManager(String),
    TransactionNotFound,
    TransactionNotPending(uuid::Uuid),
    PendingTransferNotFound,
    DuplicateIdempotencyKey,
    Storage(String),
    Conflict(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientBalance => write!(f, "Insufficient balance"),
            Self::BudgetExceeded => write!(f, "Budget exceeded"),
            Self::TransferLimitExceeded => write!(f, "Transfer limit exceeded"),
            Self::InvalidAmount => write!(f, "Invalid amount"),
            Self::SelfTransfer => write!(f, "Cannot transfer to yourself"),
            Self::RecipientDomainNotAllowed(domain) => {
                write!(f, "Recipient domain not allowed: {}", domain)
            }
            Self::AccountNotFound => write!(f, "Account not found"),
            Self::EmployeeNotFound(email) => write!(f, "Employee not found: {}", email),
            Self::NotAManager(email) => write!(f, "Not a manager: {}", email),
            Self::TransactionNotFound => write!(f, "Transaction not found"),
            Self::TransactionNotPending(id) => {
                write!(f, "Transaction {} is not in pending state", id)
            }
            Self::PendingTransferNotFound => write!(f, "Pending transfer not found"),
            Self::DuplicateIdempotencyKey => write!(f, "Duplicate idempotency key"),
            Self::Storage(msg) => write!(f, "Storage error: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl LedgerError {
    /// Domain rejections are returned to callers as failure results;
    /// everything else is a system failure.
    pub fn is_domain_rejection(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Conflict(_))
    }

    /// User-facing message for the command surface.
    ///
    /// This is the single scrubbing point: balance and budget rejections never
    /// echo figures, and internal conflict reasons are replaced with generic
    /// retry text before they can reach an untrusted audience.
    pub fn user_message(&self) -> String {
        match self {
            Self::InsufficientBalance => "Insufficient balance for this transfer.".to_string(),
            Self::BudgetExceeded => "Insufficient budget for this amount.".to_string(),
            Self::TransferLimitExceeded => {
                "This transfer would exceed your limit for the current period.".to_string()
            }
            Self::InvalidAmount => "Amount must be a positive whole number of cents.".to_string(),
            Self::SelfTransfer => "You cannot send coins to yourself.".to_string(),
            Self::RecipientDomainNotAllowed(_) => {
                "Recipient email is outside the organization.".to_string()
            }
            Self::AccountNotFound | Self::EmployeeNotFound(_) => {
                "Recipient could not be found.".to_string()
            }
            Self::NotAManager(_) => "Only managers can award coins.".to_string(),
            Self::TransactionNotPending(_) | Self::Conflict(_) => {
                "The request could not be completed. Please try again.".to_string()
            }
            Self::TransactionNotFound | Self::PendingTransferNotFound => {
                "The requested record could not be found.".to_string()
            }
            Self::DuplicateIdempotencyKey => "This operation was already applied.".to_string(),
            Self::Storage(_) => "Something went wrong. Please try again later.".to_string(),
        }
    }
}
