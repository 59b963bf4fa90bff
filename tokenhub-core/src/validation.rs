use thiserror::Error;

use crate::Tokens;

/// Problems found before anything is sent to the backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be a positive number of tokens")]
    NonPositiveAmount,
    #[error("Minimum request amount is {minimum} tokens")]
    BelowMinimumRequest { minimum: Tokens },
    #[error("Minimum transfer amount is {minimum} tokens")]
    BelowMinimumTransfer { minimum: Tokens },
    #[error("You must maintain a minimum balance of {minimum_balance} tokens")]
    BelowMinimumBalance { minimum_balance: Tokens },
    #[error("A recipient email is required")]
    MissingRecipient,
    #[error("New passwords do not match")]
    PasswordMismatch,
    #[error("Only pending requests can be edited")]
    RequestNotPending,
    #[error("Please enter a product description")]
    EmptyPrompt,
    #[error("No API tokens available. Please request more tokens.")]
    NoTokensAvailable,
}

/// The thresholds a transfer is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    /// The smallest amount that can be sent
    pub min_transfer: Tokens,
    /// The balance the sender has to keep after sending
    pub min_balance: Tokens,
}

impl TransferLimits {
    /// The largest amount that can be sent from the given balance
    pub fn max_transfer(&self, balance: Tokens) -> Tokens {
        (balance - self.min_balance).max(0)
    }

    /// Checks a transfer of `amount` from `balance` against the limits
    pub fn check(&self, balance: Tokens, amount: Tokens) -> Result<(), ValidationError> {
        if amount <= 0 {
            return Err(ValidationError::NonPositiveAmount);
        }

        if amount < self.min_transfer {
            return Err(ValidationError::BelowMinimumTransfer {
                minimum: self.min_transfer,
            });
        }

        if amount > self.max_transfer(balance) {
            return Err(ValidationError::BelowMinimumBalance {
                minimum_balance: self.min_balance,
            });
        }

        Ok(())
    }
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            min_transfer: 1,
            min_balance: 20,
        }
    }
}

/// Checks the amount of a new token request
pub fn check_request_amount(amount: Tokens, minimum: Tokens) -> Result<(), ValidationError> {
    check_positive(amount)?;

    if amount < minimum {
        return Err(ValidationError::BelowMinimumRequest { minimum });
    }

    Ok(())
}

pub fn check_positive(amount: Tokens) -> Result<(), ValidationError> {
    if amount <= 0 {
        return Err(ValidationError::NonPositiveAmount);
    }

    Ok(())
}

pub fn check_password_confirmation(new: &str, confirmation: &str) -> Result<(), ValidationError> {
    if new != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }

    Ok(())
}
