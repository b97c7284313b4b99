pub mod pg_attempts;
pub mod pg_bank;
pub mod pg_users;
pub mod pool;
