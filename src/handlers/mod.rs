pub mod ask;
pub mod run;

pub use ask::AskHandler;
pub use run::RunHandler;
