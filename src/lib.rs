// hidconsole - raw HID report console
// Framing, single-flight queued sends, paced batch transfers and file chunking

pub mod batch;
pub mod chunker;
pub mod config;
pub mod frame;
pub mod log;
pub mod queue;
pub mod session;
pub mod store;

pub use batch::{BatchError, BatchProgress, BatchSender, BatchState, ReportSink};
pub use chunker::{chunk_bytes, chunk_file, chunk_reader, preview, split_hex_text, ChunkError};
pub use config::{ConfigError, ConsoleConfig};
pub use frame::{decode, parse_hex, FrameCodec, FramingError, Report, DEFAULT_REPORT_SIZE};
pub use log::{LogKind, LogLine, MemoryLog, SessionLog, StdoutLog};
pub use queue::OutboundQueue;
pub use session::{
    DeviceSelector, DeviceSession, PickIndex, SessionError, SessionEvent, SessionHandle,
    SessionState, SessionStatus,
};
pub use store::{KeyValueStore, Shortcut, ShortcutBook, StoreError};
