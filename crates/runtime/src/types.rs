use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Stopped,
    Created,
    Paused,
    Pausing,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct ContainerInfo {

    pub id: String,
    pub image: String,
    pub has_task: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct StopOptions {
    pub force: bool,
    pub timeout: Duration,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self {
            force: false,
            timeout: Duration::from_secs(10),
        }
    }
}
