//! Concrete document engines

mod mupdf;

pub use self::mupdf::MupdfEngine;
