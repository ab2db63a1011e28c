pub mod bulk;
pub mod decision;
pub mod dv;
pub mod types;
pub mod verification;
