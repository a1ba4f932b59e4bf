//! Pipeline stages around the document adapter.
//!
//! Each submodule implements exactly one transformation step and is
//! testable without a live model.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ document ──▶ encode ──▶ model ──▶ postprocess ──▶ document
//! (URL/path)  (pictures)  (PNG b64)   (VLM)     (cleanup)      (descr)
//! ```
//!
//! 1. [`input`]  — canonicalise the user-supplied path or URL to a local file
//! 2. [`encode`] — decode embedded media, downscale, PNG-encode and
//!    base64-wrap it for the multimodal request body
//! 3. [`postprocess`] — deterministic cleanup of the model's answer so it
//!    reads well as a screen-reader description

pub mod encode;
pub mod input;
pub mod postprocess;
