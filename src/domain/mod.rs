pub mod issue;
pub mod operation;
