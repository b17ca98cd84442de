//! Small cross-cutting helpers.

pub mod json_ext;
