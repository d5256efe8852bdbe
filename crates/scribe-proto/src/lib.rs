//! Wire format for the Scribe streaming sockets.
//!
//! Every protocol unit is one JSON text frame. The client writes a single
//! [`OutgoingRequest`] per user message and reads a sequence of
//! [`Fragment`]s back. The transcription feed speaks a different inbound
//! shape ([`TranscriptionUpdate`]) which is normalised into fragments so the
//! session layer only ever sees one inbound type.
//!
//! Decoding is lenient about unknown fields and strict about shape: anything
//! that is not a JSON object of the expected form is a [`ProtocolError`].
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod fragment;
pub mod request;
pub mod stream;
pub mod transcription;

pub use errors::{ProtocolError, Result};
pub use fragment::Fragment;
pub use request::{HistoryTurn, OutgoingRequest, Part, Role};
pub use stream::StreamKind;
pub use transcription::{TranscriptionStatus, TranscriptionUpdate};
