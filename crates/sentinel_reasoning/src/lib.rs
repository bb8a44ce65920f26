pub mod api_types;
pub mod conversation;
pub mod credentials;
pub mod decode;
pub mod llm;
pub mod prompts;
pub mod providers;
pub mod report;
pub mod retry;
pub mod schedule;
pub mod session;
pub mod sync;
pub mod timers;

pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials, VaultThenEnv};
pub use llm::{CompletionParams, LlmClient};
pub use report::{ReportGenerator, ReportOutcome};
pub use schedule::{GenerateOutcome, ScheduleEngine, SystemNotice};
pub use session::{AppState, BootstrapOutcome, Session, TurnOutcome};
pub use sync::{SyncController, SyncOutcome};
