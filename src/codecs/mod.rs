// src/codecs/mod.rs
//
// Safe wrappers around native codec FFI.

#[cfg(feature = "avif")]
pub mod avif;
