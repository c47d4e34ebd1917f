pub mod executor;
pub mod notebook;
pub mod runner;

pub use executor::CommandExecutor;
pub use notebook::{
    CREDENTIAL_CELL_NEW, CREDENTIAL_CELL_OLD, Notebook, inject_parameters, replace_code,
};
pub use runner::{NotebookRunner, RunReport, parameters_from_env};
