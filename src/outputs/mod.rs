//! Output renderers for extraction results.
//!
//! Two formats are produced from the same [`crate::models`] types:
//!
//! - **Tool responses** ([`tool`]): `{content: [{type: "text", text}], isError}`
//!   payloads as an automation client expects them
//! - **JSON files** ([`json`]): batch results written under a dated directory
//!
//! # Directory Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 053000.json
//!     └── 181512.json
//! ```

pub mod json;
pub mod tool;
