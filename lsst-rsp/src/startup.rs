//! Container startup for the user's Lab.
//!
//! Two entry points share the steps defined here:
//! * [LabRunner] prepares the environment and home directory, then replaces itself with the
//!   Lab (or a non-interactive command).
//! * [InitContainer] runs the home-directory provisioning ahead of the Lab container and hands
//!   any failure over through an `ABNORMAL_STARTUP_*` file in the home directory.
//!
//! Steps never abort the startup for recoverable problems: they degrade it, recording an
//! abnormal startup that the Lab shows the user on its landing page.
pub mod abnormal;
pub mod config;
pub mod configure_env;
pub mod credentials;
pub mod dask;
pub mod environment;
pub mod error;
pub mod git;
pub mod init_container;
pub mod lab_runner;
pub mod landing_page;
pub mod launch;
pub mod outcome;
pub mod paths;
pub mod profile;
pub mod reset;
pub mod settings;
pub mod tidy;

pub use config::{ConfigError, StartupConfig, launch_lab};
pub use environment::LaunchEnvironment;
pub use error::{RspErrorCode, StartupError};
pub use init_container::InitContainer;
pub use lab_runner::LabRunner;
pub use landing_page::{Provisioner, ProvisionerError};
pub use outcome::StepOutcome;
pub use paths::StartupPaths;
