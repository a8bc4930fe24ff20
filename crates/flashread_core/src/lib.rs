pub mod domain;
pub mod fingerprint;
pub mod parser;
pub mod ports;
pub mod reader;
pub mod stats;
pub mod sync;

#[cfg(any(test, feature = "test_utils"))]
pub mod testing;

pub use domain::{
    CrashBuffer, DailyStats, DisplayStats, Document, DocumentSource, ExportBundle, LifetimeStats,
    MetaRecord, NewRemoteDocument, RemoteDocument, RemoteSession, RemoteStats, ReuploadRequest,
    StreakRecord, EXPORT_VERSION,
};
pub use ports::{
    Clock, LocalStore, NullLocalStore, NullRemoteStore, PortError, PortResult, RemoteStore,
    SourceParser, SystemClock,
};
pub use reader::{ReaderObserver, ReaderOptions, ReaderState, SpeedReader};
pub use stats::StatsEngine;
pub use sync::SyncCoordinator;
