pub mod check;
pub mod correct;
pub mod solve;
