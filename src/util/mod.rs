//! Text helpers shared by rendering and search.
//!
//! - **HTML**: tag stripping and character-count truncation for excerpts
//! - **Dates**: relative publication dates (`Today, 09:05 AM`)
//! - **Terminal**: Unicode-aware width truncation and control-character removal
//!
//! # Examples
//!
//! ```
//! use caschy::util::{strip_html, truncate_text, truncate_to_width};
//!
//! assert_eq!(strip_html("<p>Hello</p>"), "Hello");
//! assert_eq!(truncate_text("<b>Hello World</b>", 5), "Hello...");
//! assert_eq!(truncate_to_width("Hello World", 8), "Hello...");
//! ```

mod text;

pub use text::{
    display_width, format_date, format_date_in, strip_control_chars, strip_html, truncate_text,
    truncate_to_width,
};
