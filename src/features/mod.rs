pub mod chatstate;
pub mod editing;
pub mod presence;
pub mod reactions;
pub mod star;
