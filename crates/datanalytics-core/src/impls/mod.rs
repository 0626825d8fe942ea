//! Impls - concrete adapters for the ports.

pub mod csv_dataset;
pub mod inmem_projects;
pub mod shell_runner;

pub use self::csv_dataset::CsvDatasetReader;
pub use self::inmem_projects::InMemoryProjectStore;
pub use self::shell_runner::ShellRunner;
