mod git;

pub use git::*;
