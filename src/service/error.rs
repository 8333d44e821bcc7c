use thiserror::Error;
use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Referral code '{0}' not found")]
    ReferralCodeNotFound(String),

    #[error("Referral {0} not found")]
    ReferralNotFound(Uuid),

    #[error("Member {0} not found")]
    MemberNotFound(Uuid),

    #[error("You cannot claim your own referral code")]
    SelfReferral,

    #[error("This phone number has already used a referral credit")]
    AlreadyClaimed,

    #[error("Custom code must be at least 3 characters after removing symbols")]
    CustomCodeTooShort,

    #[error("That code is already taken, try another one")]
    CodeAlreadyTaken,

    #[error("You already hold the maximum of {0} referral codes")]
    CodeLimitReached(usize),

    #[error("You have {0} pending invitations, wait for some to complete before sending more")]
    InviteLimitReached(i64),

    #[error("Could not generate a unique referral code, please retry")]
    CodeGenerationExhausted,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scheduling API error: {0}")]
    SchedulingApi(String),

    #[error("SMS delivery error: {0}")]
    Sms(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::ReferralCodeNotFound(_)
            | ServiceError::ReferralNotFound(_)
            | ServiceError::MemberNotFound(_) => HttpError::not_found(error.to_string()),

            ServiceError::Validation(_) | ServiceError::CustomCodeTooShort => {
                HttpError::bad_request(error.to_string())
            }

            ServiceError::SelfReferral
            | ServiceError::AlreadyClaimed
            | ServiceError::CodeAlreadyTaken
            | ServiceError::CodeLimitReached(_)
            | ServiceError::InviteLimitReached(_) => HttpError::conflict(error.to_string()),

            // Database details stay in the logs, callers get a generic message.
            ServiceError::Database(ref err) => {
                tracing::error!("database error: {}", err);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }

            _ => HttpError::server_error(error.to_string()),
        }
    }
}
