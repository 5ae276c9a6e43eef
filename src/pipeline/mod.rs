//! Pipeline stages for image-to-PDF conversion.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the two output writers share nothing but the input list.
//!
//! ## Data Flow
//!
//! ```text
//!                        ┌─▶ probe ──▶ layout ──▶ document ──┐
//! input ──▶ order ──▶ job│                                   ├─▶ sink (temp file → rename)
//!                        └─────────────▶ archive ────────────┘
//! ```
//!
//! 1. [`input`]   : supported-extension filter, the editable [`input::ImageSet`],
//!    and non-recursive directory scans
//! 2. [`order`]   : natural or modification-time ordering of discovered files
//! 3. [`probe`]   : read an image, measure it from its header and prepare
//!    its bytes for embedding (no re-encoding of JPEG or plain PNG)
//! 4. [`layout`]  : pure page geometry: fixed sheet or fit-to-image
//! 5. [`document`]: one PDF page per image, written with `lopdf`
//! 6. [`archive`] : one ZIP entry per source file, bytes copied verbatim
//! 7. [`sink`]    : output files are written beside the target and renamed
//!    into place only when the stream succeeds

pub mod archive;
pub mod document;
pub mod input;
pub mod layout;
pub mod order;
pub mod probe;
pub mod sink;
