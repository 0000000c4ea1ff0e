//! Client-Side Reply Streaming
//!
//! Turns a data stream body into one growing assistant message.
//!
//! # Turn State Machine
//!
//! ```text
//!        submit            first text            finish part
//! Idle ─────────► Sending ────────────► Receiving ───────────► Idle
//!                    │                      │
//!                    └──────────┬───────────┘
//!                   error, timeout, end without finish
//!                               ▼
//!                            Errored ── fallback appended ──► Idle
//! ```
//!
//! Fragments are applied in arrival order. Each one replaces the assistant
//! entry's content with the cumulative text, so the UI always shows a single
//! bubble for the reply.

mod assembler;

pub use assembler::{CompletedReply, StreamAssembler, TurnFailure};
