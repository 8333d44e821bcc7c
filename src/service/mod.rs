pub mod attribution_service;
pub mod audit;
pub mod availability;
pub mod background_jobs;
pub mod booking_rules;
pub mod error;
pub mod fraud;
pub mod otp;
pub mod referral_code_service;
pub mod reward_issuer;
pub mod scheduling_api;
pub mod sms;
