pub mod db;
pub mod memberdb;
pub mod referraldb;
pub mod syncdb;

#[cfg(test)]
pub mod testing;
