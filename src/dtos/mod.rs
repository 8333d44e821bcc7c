pub mod authdtos;
pub mod bookingdtos;
pub mod referraldtos;
