// External crates
use serde::{Deserialize, Serialize};

/// Desired state of an application as recorded by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationState {
    Started,
    #[default]
    Stopped,
}

/// Whether the current package has been staged into a runnable droplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    Pending,
    #[default]
    Staged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub guid: String,
    #[serde(default)]
    pub state: ApplicationState,
    #[serde(default)]
    pub package_state: PackageState,
    #[serde(default = "default_instances")]
    pub instances: u32,
}

fn default_instances() -> u32 {
    1
}

impl Application {
    pub fn new(name: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: guid.into(),
            state: ApplicationState::default(),
            package_state: PackageState::default(),
            instances: default_instances(),
        }
    }

    pub fn started(&self) -> bool {
        self.state == ApplicationState::Started
    }
}
