pub mod fetch;
pub mod host;
pub mod outcome;
pub mod release;
pub mod resolve;
pub mod settings;
pub mod spec;
pub mod version;
pub mod workflow;

pub use fetch::{FetchError, SpecFetcher};
pub use host::{
    BranchRef, ChangedFile, FileWrite, HostError, NewPull, PullQuery, PullRequest, PullState,
    RepoFile, RepoHost, WriteResult,
};
pub use outcome::{FailReason, ItemReport, RunSummary, SkipReason, SyncOutcome};
pub use resolve::{Locator, ManifestEntry, Patterns, Resolution, ResolveError, Resolver, SpecSource};
pub use settings::SyncSettings;
pub use spec::{Slug, SpecItem};
pub use workflow::{sync_all, sync_item};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
