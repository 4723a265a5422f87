pub use crate::control::{
    ControlError, ControlHandle, ControlMessage, ControlReply, ControlServer,
    spawn_control_server,
};
pub use crate::lifecycle::{
    ActivationReport, InstallReport, LifecycleController, LifecycleError,
    LifecycleState, WorkerScope,
};
pub use crate::reset::{
    PageHost, PageStorage, Registrations, ResetError, ResetReport, ResetUtility,
};
pub use crate::strategy::Strategy;
pub use crate::worker::{FetchOutcome, ServiceWorker, WorkerError};
pub use sworker_cache::{
    HttpRequest, HttpResponse, InMemoryPartitionStore, PartitionRegistry,
    PartitionRole, PartitionStore,
};
pub use sworker_config::{
    ConfigFile, Configurable, NetworkClient, NetworkError, RetryExecutor,
    RetryPolicy, WorkerConfig,
};
pub use sworker_router::{RequestClassifier, Route, StrategyKind};
